//! The identity provider capability.
//!
//! The provider owns the cryptographic order protocol and the rotating QR
//! cache. We only need three things from it: start an order, collect its
//! status, and read the latest QR artifact it cached for an order.

use std::{future::Future, pin::Pin};
use thiserror::Error;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

/// A freshly started provider order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderOrder {
    pub order_ref: String,
    /// First QR artifact; `None` when the provider could not issue a QR challenge.
    pub qr: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectStatus {
    Pending,
    Failed,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionUser {
    pub personal_number: String,
    pub name: String,
    pub given_name: String,
    pub surname: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionData {
    pub user: CompletionUser,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectResponse {
    pub order_ref: String,
    pub status: CollectStatus,
    pub hint_code: Option<String>,
    pub completion_data: Option<CompletionData>,
}

impl CollectResponse {
    #[must_use]
    pub fn pending(order_ref: &str, hint_code: &str) -> Self {
        Self {
            order_ref: order_ref.to_string(),
            status: CollectStatus::Pending,
            hint_code: Some(hint_code.to_string()),
            completion_data: None,
        }
    }

    #[must_use]
    pub fn failed(order_ref: &str, hint_code: &str) -> Self {
        Self {
            order_ref: order_ref.to_string(),
            status: CollectStatus::Failed,
            hint_code: Some(hint_code.to_string()),
            completion_data: None,
        }
    }

    #[must_use]
    pub fn complete(order_ref: &str, user: Option<CompletionUser>) -> Self {
        Self {
            order_ref: order_ref.to_string(),
            status: CollectStatus::Complete,
            hint_code: None,
            completion_data: user.map(|user| CompletionData { user }),
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    /// Start a new order. `end_user_ip` is the liveness evidence the provider asks for.
    fn authenticate<'a>(
        &'a self,
        end_user_ip: &'a str,
    ) -> ProviderFuture<'a, Result<ProviderOrder, ProviderError>>;

    fn collect<'a>(
        &'a self,
        order_ref: &'a str,
    ) -> ProviderFuture<'a, Result<CollectResponse, ProviderError>>;

    /// Latest QR artifact cached for `order_ref`, if the order is still cached.
    fn latest_qr<'a>(&'a self, order_ref: &'a str) -> ProviderFuture<'a, Option<String>>;
}

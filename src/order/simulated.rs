//! In-memory identity provider used for local runs and tests.
//!
//! Orders complete after a configurable number of collects. An order that is
//! not completed within `order_ttl` lapses and collects as `failed` once, which
//! is what a real provider does once its one-time QR window is over. Completed
//! and lapsed orders are both dropped on that collect.

use rand::RngCore;
use std::{collections::HashMap, time::Duration};
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;
use uuid::Uuid;

use super::provider::{
    CollectResponse, CompletionUser, IdentityProvider, ProviderError, ProviderFuture,
    ProviderOrder,
};

const DEFAULT_PERSONAL_NUMBER: &str = "199001011234";
const DEFAULT_COMPLETE_AFTER: u32 = 5;
const DEFAULT_ORDER_TTL_SECONDS: u64 = 30;
const DEFAULT_QR_CACHE_TTL_SECONDS: u64 = 300;

#[derive(Clone, Debug)]
pub struct SimulatedConfig {
    personal_number: String,
    complete_after: u32,
    order_ttl: Duration,
    qr_cache_ttl: Duration,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            personal_number: DEFAULT_PERSONAL_NUMBER.to_string(),
            complete_after: DEFAULT_COMPLETE_AFTER,
            order_ttl: Duration::from_secs(DEFAULT_ORDER_TTL_SECONDS),
            qr_cache_ttl: Duration::from_secs(DEFAULT_QR_CACHE_TTL_SECONDS),
        }
    }
}

impl SimulatedConfig {
    #[must_use]
    pub fn with_personal_number(mut self, personal_number: String) -> Self {
        self.personal_number = personal_number;
        self
    }

    /// Number of collects an order answers `pending` before completing.
    /// Zero means the order never completes on its own.
    #[must_use]
    pub fn with_complete_after(mut self, collects: u32) -> Self {
        self.complete_after = collects;
        self
    }

    #[must_use]
    pub fn with_order_ttl(mut self, ttl: Duration) -> Self {
        self.order_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_qr_cache_ttl(mut self, ttl: Duration) -> Self {
        self.qr_cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn personal_number(&self) -> &str {
        &self.personal_number
    }
}

#[derive(Debug)]
struct SimulatedOrder {
    qr_start_token: String,
    created_at: Instant,
    collects: u32,
}

impl SimulatedOrder {
    // The artifact changes every second, like the provider's animated QR.
    fn qr(&self) -> String {
        format!(
            "sim.{}.{}",
            self.qr_start_token,
            self.created_at.elapsed().as_secs()
        )
    }
}

#[derive(Debug, Default)]
pub struct SimulatedProvider {
    config: SimulatedConfig,
    orders: Mutex<HashMap<String, SimulatedOrder>>,
}

impl SimulatedProvider {
    #[must_use]
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            orders: Mutex::new(HashMap::new()),
        }
    }

    fn user(&self) -> CompletionUser {
        CompletionUser {
            personal_number: self.config.personal_number.clone(),
            name: "Test Testsson".to_string(),
            given_name: "Test".to_string(),
            surname: "Testsson".to_string(),
        }
    }

    async fn start_order(&self, end_user_ip: &str) -> ProviderOrder {
        let mut token = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut token);
        let order = SimulatedOrder {
            qr_start_token: token.iter().map(|b| format!("{b:02x}")).collect(),
            created_at: Instant::now(),
            collects: 0,
        };
        let order_ref = Uuid::new_v4().to_string();
        let qr = order.qr();

        let mut orders = self.orders.lock().await;
        orders.retain(|_, entry| entry.created_at.elapsed() < self.config.qr_cache_ttl);
        orders.insert(order_ref.clone(), order);
        debug!(order_ref = %order_ref, end_user_ip, "simulated order started");

        ProviderOrder {
            order_ref,
            qr: Some(qr),
        }
    }

    async fn collect_order(&self, order_ref: &str) -> Result<CollectResponse, ProviderError> {
        let mut orders = self.orders.lock().await;
        let Some(order) = orders.get_mut(order_ref) else {
            return Err(ProviderError::Rejected(format!("notFound: {order_ref}")));
        };

        if order.created_at.elapsed() >= self.config.order_ttl {
            // A failed order is final; its replacement gets a new reference.
            orders.remove(order_ref);
            return Ok(CollectResponse::failed(order_ref, "expiredTransaction"));
        }

        order.collects += 1;
        let collects = order.collects;
        if self.config.complete_after > 0 && collects >= self.config.complete_after {
            // Completed orders leave the cache.
            orders.remove(order_ref);
            return Ok(CollectResponse::complete(order_ref, Some(self.user())));
        }

        let hint = if collects > 1 {
            "userSign"
        } else {
            "outstandingTransaction"
        };
        Ok(CollectResponse::pending(order_ref, hint))
    }

    async fn cached_qr(&self, order_ref: &str) -> Option<String> {
        let orders = self.orders.lock().await;
        orders
            .get(order_ref)
            .filter(|order| order.created_at.elapsed() < self.config.qr_cache_ttl)
            .map(SimulatedOrder::qr)
    }
}

impl IdentityProvider for SimulatedProvider {
    fn authenticate<'a>(
        &'a self,
        end_user_ip: &'a str,
    ) -> ProviderFuture<'a, Result<ProviderOrder, ProviderError>> {
        Box::pin(async move { Ok(self.start_order(end_user_ip).await) })
    }

    fn collect<'a>(
        &'a self,
        order_ref: &'a str,
    ) -> ProviderFuture<'a, Result<CollectResponse, ProviderError>> {
        Box::pin(self.collect_order(order_ref))
    }

    fn latest_qr<'a>(&'a self, order_ref: &'a str) -> ProviderFuture<'a, Option<String>> {
        Box::pin(self.cached_qr(order_ref))
    }
}

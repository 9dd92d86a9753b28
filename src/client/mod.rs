//! Client side of the QR login: state machine, countdown, HTTP client and the
//! runtime that ties them together.

pub mod api;
pub mod countdown;
pub mod machine;
pub mod runtime;
pub mod store;

pub use api::{ApiError, AuthApi};
pub use countdown::CountdownTimer;
pub use machine::{
    format_countdown, update, AuthStatus, ClientAuthState, Effect, Event, PollOutcome,
};
pub use runtime::{LoginFlow, LoginOutcome, DEFAULT_POLL_INTERVAL};
pub use store::{FileSessionStore, MemorySessionStore, SessionContext, SessionStore, StoreError};

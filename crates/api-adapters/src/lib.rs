//! # api-adapters
//!
//! The HTTP surface of Slim Chat: routing, the auth gate, error mapping and
//! the real-time dialog hub.

pub mod metrics;
pub mod realtime;

#[cfg(feature = "web-axum")]
pub mod auth;
#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::Metrics;
pub use realtime::DialogHub;

#[cfg(feature = "web-axum")]
pub use auth::{AuthUser, ALLOW_LIST};
#[cfg(feature = "web-axum")]
pub use router::build_router;
#[cfg(feature = "web-axum")]
pub use state::AppState;

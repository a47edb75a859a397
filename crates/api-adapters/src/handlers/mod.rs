//! # Handlers
//!
//! Thin adapters between axum extractors and the services. Handlers never
//! touch a repository directly.

pub mod dialogs;
pub mod messages;
pub mod user;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use domains::DomainError;

use crate::error::ApiError;
use crate::state::AppState;

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(
                CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => ApiError(DomainError::internal(e)).into_response(),
    }
}

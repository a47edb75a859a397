//! # Auth gate
//!
//! Runs in front of every route that is not on the allow-list. A verified
//! claim becomes an [`AuthUser`] in the request extensions; anything else
//! ends the request with a bare 401.

use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

/// Paths served without a token. Matched exactly.
pub const ALLOW_LIST: &[&str] = &[
    "/user/login",
    "/user/register",
    "/user/verify",
    "/login",
    "/register",
];

/// Header carrying the token.
pub const TOKEN_HEADER: &str = "token";

/// Identity of the caller, available to every gated handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// `token` header first, then `Authorization: Bearer`, then `?token=`
/// (browsers cannot set headers on a WebSocket handshake).
fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(value) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(value.trim().to_string()).filter(|t| !t.is_empty());
    }
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return value
            .strip_prefix("Bearer ")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

pub async fn auth_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if ALLOW_LIST.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let Some(token) = extract_token(req.headers(), req.uri()) else {
        tracing::debug!(path = %req.uri().path(), "no token presented");
        state.metrics.auth_denials.inc();
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match state.tokens.verify(&token) {
        Ok(id) => {
            req.extensions_mut().insert(AuthUser { id });
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(path = %req.uri().path(), error = %e, "token rejected");
            state.metrics.auth_denials.inc();
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

//! # ApiError
//!
//! Maps `DomainError` onto HTTP. Every error body is
//! `{"status":"error","message":...}`; validation failures add `errors`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub DomainError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(DomainError::invalid("body", &rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(DomainError::invalid("query", &rejection.body_text()))
    }
}

/// Unparseable ids address nothing.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError(DomainError::NotFound("Not Found".into()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::InvalidToken => StatusCode::UNAUTHORIZED,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.0 {
            DomainError::Validation(errors) => {
                tracing::debug!(?errors, "request rejected");
                let message = errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Validation failed".to_string());
                let body = json!({ "status": "error", "message": message, "errors": errors });
                (status, Json(body)).into_response()
            }
            DomainError::InvalidToken => status.into_response(),
            DomainError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                let body = json!({ "status": "error", "message": "Internal server error" });
                (status, Json(body)).into_response()
            }
            DomainError::NotFound(message)
            | DomainError::Forbidden(message)
            | DomainError::Conflict(message) => {
                tracing::debug!(%status, %message, "request rejected");
                (status, Json(json!({ "status": "error", "message": message }))).into_response()
            }
        }
    }
}

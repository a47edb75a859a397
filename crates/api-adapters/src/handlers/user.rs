//! Account routes: registration, verification, login and user lookups.

use askama::Template;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::Json;
use domains::{DomainError, User};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use services::{LoginInput, RegisterInput};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct Registered {
    #[serde(flatten)]
    user: User,
    status: &'static str,
}

#[derive(Template)]
#[template(path = "verified.html")]
struct VerifiedPage<'a> {
    fullname: &'a str,
    email: &'a str,
    login_url: &'a str,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    hash: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    query: String,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> ApiResult<Json<Registered>> {
    let Json(input) = payload?;
    let user = state.accounts.register(input).await?;
    state.metrics.registrations.inc();
    Ok(Json(Registered {
        user,
        status: "success",
    }))
}

pub async fn verify(
    State(state): State<AppState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> ApiResult<Html<String>> {
    let Query(query) = query?;
    let user = state
        .accounts
        .verify(query.hash.as_deref().unwrap_or_default())
        .await?;
    let page = VerifiedPage {
        fullname: &user.fullname,
        email: &user.email,
        login_url: "/login",
    };
    let html = page.render().map_err(DomainError::internal)?;
    Ok(Html(html))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    match state.accounts.login(input).await {
        Ok(issued) => {
            state.metrics.record_login("success");
            Ok(Json(json!({
                "status": "success",
                "token": issued.token,
                "expires_at": issued.expires_at,
            })))
        }
        Err(err) => {
            let outcome = match &err {
                DomainError::Validation(_) => "invalid",
                DomainError::NotFound(_) => "unknown_user",
                DomainError::Forbidden(_) => "denied",
                _ => "error",
            };
            state.metrics.record_login(outcome);
            Err(ApiError(err))
        }
    }
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<User>> {
    Ok(Json(state.accounts.me(auth.id).await?))
}

pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<User>>> {
    let Query(query) = query?;
    Ok(Json(state.accounts.search(&query.query).await?))
}

pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<User>> {
    let Path(id) = id?;
    Ok(Json(state.accounts.get(id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let user = state.accounts.delete(auth.id, id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("User {} deleted", user.fullname),
    })))
}

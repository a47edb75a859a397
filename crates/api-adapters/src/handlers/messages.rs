use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use domains::{DomainError, Message};
use serde::Deserialize;
use services::NewMessageInput;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DialogQuery {
    dialog: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct AttachInput {
    file: Uuid,
}

pub async fn list_by_dialog(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<DialogQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Message>>> {
    let Query(query) = query?;
    let dialog_id = query
        .dialog
        .ok_or_else(|| DomainError::invalid("dialog", "Dialog id is required"))?;
    Ok(Json(state.messages.list_by_dialog(auth.id, dialog_id).await?))
}

pub async fn list_sent(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.messages.list_by_user(auth.id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<NewMessageInput>, JsonRejection>,
) -> ApiResult<Json<Message>> {
    let Json(input) = payload?;
    let message = state.messages.create(auth.id, input).await?;
    state.metrics.messages_created.inc();
    Ok(Json(message))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Message>> {
    let Path(message_id) = id?;
    Ok(Json(state.messages.mark_read(auth.id, message_id).await?))
}

pub async fn attach(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AttachInput>, JsonRejection>,
) -> ApiResult<Json<Message>> {
    let Path(message_id) = id?;
    let Json(input) = payload?;
    Ok(Json(
        state.messages.attach(auth.id, message_id, input.file).await?,
    ))
}

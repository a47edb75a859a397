//! Dialog routes and the live WebSocket feed.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use domains::{ChatEvent, Dialog};
use serde_json::{json, Value};
use services::NewDialogInput;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::realtime::DialogHub;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<Dialog>>> {
    Ok(Json(state.dialogs.list(auth.id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<NewDialogInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let (dialog, message) = state.dialogs.create(auth.id, input).await?;
    state.metrics.messages_created.inc();
    Ok(Json(json!({ "dialog": dialog, "message": message })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(dialog_id) = id?;
    let message_ids = state.messages.mark_dialog_read(auth.id, dialog_id).await?;
    Ok(Json(json!({ "status": "success", "message_ids": message_ids })))
}

/// Joins the dialog topic, then upgrades. Subscribing before the upgrade
/// means nothing published after the participant check is missed.
pub async fn live(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let Path(dialog_id) = id?;
    let dialog = state.dialogs.get_for_participant(auth.id, dialog_id).await?;
    let events = state.hub.subscribe(dialog.id);
    tracing::info!(user_id = %auth.id, dialog_id = %dialog.id, "live session joined");
    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| forward_events(socket, hub, events, auth.id, dialog.id)))
}

async fn forward_events(
    mut socket: WebSocket,
    hub: Arc<DialogHub>,
    mut events: broadcast::Receiver<ChatEvent>,
    user_id: Uuid,
    dialog_id: Uuid,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to encode chat event");
                            continue;
                        }
                    };
                    if socket.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%user_id, %dialog_id, skipped, "live session lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                // Clients only listen; their frames are ignored.
                Some(Ok(_)) => {}
            },
        }
    }
    drop(events);
    hub.prune(dialog_id);
    tracing::info!(%user_id, %dialog_id, "live session left");
}

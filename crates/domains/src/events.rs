//! Side effects produced by the services and drained by the outbox worker.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

/// Payload pushed to every session endpoint joined to a dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    NewMessage {
        message: Message,
    },
    MessagesRead {
        dialog_id: Uuid,
        reader_id: Uuid,
        message_ids: Vec<Uuid>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// One unit of fire-and-forget work.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Email(Email),
    Broadcast { dialog_id: Uuid, event: ChatEvent },
}

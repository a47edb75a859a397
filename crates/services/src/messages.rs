//! # Message Lifecycle
//!
//! creation → unchecked → read, with attachment appension. Every state
//! change is written to the store first and then queued for fan-out; the
//! store stays the source of truth when a broadcast is lost.
//!
//! Reads and attachments go through the store's single-field updates rather
//! than a load-modify-save cycle, so a read receipt racing an attachment
//! keeps both changes.

use std::sync::Arc;

use domains::{
    ChatEvent, DialogRepository, DomainError, Message, MessageRepository, Outbox, Result,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::dialogs::load_participant_dialog;
use crate::dispatch::publish;

pub const MAX_ATTACHMENTS: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessageInput {
    pub dialog_id: Uuid,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Uuid>,
}

pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    dialogs: Arc<dyn DialogRepository>,
    outbox: Arc<dyn Outbox>,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        dialogs: Arc<dyn DialogRepository>,
        outbox: Arc<dyn Outbox>,
    ) -> Self {
        Self {
            messages,
            dialogs,
            outbox,
        }
    }

    /// Persists a new unchecked message and queues it for the dialog's
    /// connected endpoints.
    pub async fn create(&self, sender: Uuid, input: NewMessageInput) -> Result<Message> {
        let text = input.text.trim();
        if text.is_empty() && input.attachments.is_empty() {
            return Err(DomainError::invalid(
                "text",
                "Message must have text or attachments",
            ));
        }
        if input.attachments.len() > MAX_ATTACHMENTS {
            return Err(DomainError::invalid("attachments", "Too many attachments"));
        }
        let dialog = load_participant_dialog(self.dialogs.as_ref(), sender, input.dialog_id).await?;

        let message = self
            .messages
            .insert(Message::new(dialog.id, sender, text, input.attachments))
            .await?;
        if let Err(e) = self.dialogs.set_last_message(dialog.id, message.id).await {
            // The message itself is stored; a stale preview is recoverable.
            tracing::warn!(dialog_id = %dialog.id, error = %e, "last message not updated");
        }
        tracing::info!(message_id = %message.id, dialog_id = %dialog.id, %sender, "message created");

        publish(
            self.outbox.as_ref(),
            dialog.id,
            ChatEvent::NewMessage {
                message: message.clone(),
            },
        );
        Ok(message)
    }

    /// Read receipt for a single message.
    ///
    /// Only the recipient's acknowledgement clears `unchecked`; repeated
    /// calls, and calls by the sender, return the stored record untouched.
    pub async fn mark_read(&self, reader: Uuid, message_id: Uuid) -> Result<Message> {
        let mut message = self.load(message_id).await?;
        load_participant_dialog(self.dialogs.as_ref(), reader, message.dialog_id).await?;

        if message.sender_id == reader || !message.unchecked {
            return Ok(message);
        }
        if !self.messages.mark_checked(message.id).await? {
            // Another request got there first and owns the broadcast.
            return self.load(message_id).await;
        }
        message.mark_checked();
        tracing::debug!(message_id = %message.id, %reader, "message read");

        publish(
            self.outbox.as_ref(),
            message.dialog_id,
            ChatEvent::MessagesRead {
                dialog_id: message.dialog_id,
                reader_id: reader,
                message_ids: vec![message.id],
            },
        );
        Ok(message)
    }

    /// Marks every unchecked message from the other participant as read.
    /// Returns the ids that changed.
    pub async fn mark_dialog_read(&self, reader: Uuid, dialog_id: Uuid) -> Result<Vec<Uuid>> {
        let dialog = load_participant_dialog(self.dialogs.as_ref(), reader, dialog_id).await?;

        let mut changed = Vec::new();
        for message in self.messages.list_by_dialog(dialog.id).await? {
            if message.sender_id != reader
                && message.unchecked
                && self.messages.mark_checked(message.id).await?
            {
                changed.push(message.id);
            }
        }

        if !changed.is_empty() {
            tracing::debug!(%dialog_id, %reader, count = changed.len(), "dialog read");
            publish(
                self.outbox.as_ref(),
                dialog.id,
                ChatEvent::MessagesRead {
                    dialog_id: dialog.id,
                    reader_id: reader,
                    message_ids: changed.clone(),
                },
            );
        }
        Ok(changed)
    }

    /// Appends a file reference; only the sender may do this.
    pub async fn attach(&self, sender: Uuid, message_id: Uuid, file: Uuid) -> Result<Message> {
        let message = self.load(message_id).await?;
        if message.sender_id != sender {
            return Err(DomainError::Forbidden(
                "Only the sender can attach files".into(),
            ));
        }
        self.messages
            .push_attachment(message.id, file, MAX_ATTACHMENTS)
            .await?
            .ok_or_else(|| DomainError::invalid("attachments", "Too many attachments"))
    }

    /// The dialog's history, oldest first.
    pub async fn list_by_dialog(&self, reader: Uuid, dialog_id: Uuid) -> Result<Vec<Message>> {
        let dialog = load_participant_dialog(self.dialogs.as_ref(), reader, dialog_id).await?;
        self.messages.list_by_dialog(dialog.id).await
    }

    /// Everything `user_id` has sent, oldest first.
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Message>> {
        self.messages.list_by_sender(user_id).await
    }

    async fn load(&self, message_id: Uuid) -> Result<Message> {
        self.messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Message not found".into()))
    }
}

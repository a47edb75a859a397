//! Dialog collaborator: starting a conversation and listing a user's dialogs.

use std::sync::Arc;

use domains::{
    ChatEvent, Dialog, DialogRepository, DomainError, Message, MessageRepository, Outbox, Result,
    UserRepository,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::dispatch::publish;

#[derive(Debug, Clone, Deserialize)]
pub struct NewDialogInput {
    pub partner: Uuid,
    #[serde(default)]
    pub text: String,
}

pub struct DialogService {
    dialogs: Arc<dyn DialogRepository>,
    users: Arc<dyn UserRepository>,
    messages: Arc<dyn MessageRepository>,
    outbox: Arc<dyn Outbox>,
}

impl DialogService {
    pub fn new(
        dialogs: Arc<dyn DialogRepository>,
        users: Arc<dyn UserRepository>,
        messages: Arc<dyn MessageRepository>,
        outbox: Arc<dyn Outbox>,
    ) -> Self {
        Self {
            dialogs,
            users,
            messages,
            outbox,
        }
    }

    /// Opens a dialog with `partner`; `text` becomes its first message.
    ///
    /// The store rejects a second dialog for the same pair. When the first
    /// message cannot be stored the dialog is removed again, so a dialog
    /// never exists without its opening message.
    pub async fn create(&self, author: Uuid, input: NewDialogInput) -> Result<(Dialog, Message)> {
        if input.partner == author {
            return Err(DomainError::invalid(
                "partner",
                "Cannot start a dialog with yourself",
            ));
        }
        let text = input.text.trim();
        if text.is_empty() {
            return Err(DomainError::invalid("text", "Message text is required"));
        }
        if self.users.find_by_id(input.partner).await?.is_none() {
            return Err(DomainError::NotFound("Partner not found".into()));
        }

        let mut dialog = Dialog::new(author, input.partner);
        let message = Message::new(dialog.id, author, text, Vec::new());
        dialog.last_message = Some(message.id);

        let dialog = self.dialogs.insert(dialog).await?;
        let message = match self.messages.insert(message).await {
            Ok(message) => message,
            Err(e) => {
                if let Err(cleanup) = self.dialogs.delete(dialog.id).await {
                    tracing::warn!(dialog_id = %dialog.id, error = %cleanup, "empty dialog left behind");
                }
                return Err(e);
            }
        };
        tracing::info!(dialog_id = %dialog.id, %author, partner = %input.partner, "dialog created");

        publish(
            self.outbox.as_ref(),
            dialog.id,
            ChatEvent::NewMessage {
                message: message.clone(),
            },
        );
        Ok((dialog, message))
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Dialog>> {
        self.dialogs.list_for_user(user_id).await
    }

    /// Loads a dialog on behalf of one of its participants.
    pub async fn get_for_participant(&self, user_id: Uuid, dialog_id: Uuid) -> Result<Dialog> {
        load_participant_dialog(self.dialogs.as_ref(), user_id, dialog_id).await
    }
}

pub(crate) async fn load_participant_dialog(
    dialogs: &dyn DialogRepository,
    user_id: Uuid,
    dialog_id: Uuid,
) -> Result<Dialog> {
    let dialog = dialogs
        .find_by_id(dialog_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("Dialog not found".into()))?;
    if !dialog.has_participant(user_id) {
        return Err(DomainError::Forbidden(
            "You are not a participant of this dialog".into(),
        ));
    }
    Ok(dialog)
}

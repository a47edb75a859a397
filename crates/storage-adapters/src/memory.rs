//! # In-memory document store
//!
//! One `DashMap` per collection. Every write touches a single entry, so
//! concurrent writers never overwrite each other's fields. Uniqueness (one
//! account per e-mail, one dialog per participant pair) goes through index
//! maps and their entry API, which makes the check-and-insert atomic.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    Dialog, DialogRepository, DomainError, Message, MessageRepository, Result, User,
    UserRepository,
};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    /// lowercased e-mail → user id
    emails: DashMap<String, Uuid>,
    dialogs: DashMap<Uuid, Dialog>,
    /// ordered participant pair → dialog id
    pairs: DashMap<(Uuid, Uuid), Uuid>,
    messages: DashMap<Uuid, Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops a dialog, its pair index entry and its messages.
    fn remove_dialog(&self, id: Uuid) {
        if let Some((_, dialog)) = self.dialogs.remove(&id) {
            self.pairs.remove_if(&dialog.pair_key(), |_, owner| *owner == id);
            self.messages.retain(|_, m| m.dialog_id != id);
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: User) -> Result<User> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(DomainError::Conflict("Email already registered".into())),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_confirm_hash(&self, hash: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.confirm_hash == hash)
            .map(|u| u.value().clone()))
    }

    async fn save(&self, user: &User) -> Result<()> {
        match self.users.get_mut(&user.id) {
            Some(mut stored) => {
                *stored = user.clone();
                Ok(())
            }
            None => Err(DomainError::NotFound("User not found".into())),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<User>> {
        let needle = query.to_lowercase();
        let mut found: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.fullname.to_lowercase().contains(&needle) || u.email.contains(&needle))
            .map(|u| u.value().clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    /// Cascades to every dialog the user takes part in.
    async fn delete(&self, id: Uuid) -> Result<Option<User>> {
        let removed = self.users.remove(&id).map(|(_, user)| user);
        if let Some(user) = &removed {
            self.emails.remove(&user.email);
            let owned: Vec<Uuid> = self
                .dialogs
                .iter()
                .filter(|d| d.has_participant(id))
                .map(|d| d.id)
                .collect();
            for dialog_id in owned {
                self.remove_dialog(dialog_id);
            }
            self.messages.retain(|_, m| m.sender_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl DialogRepository for MemoryStore {
    async fn insert(&self, dialog: Dialog) -> Result<Dialog> {
        match self.pairs.entry(dialog.pair_key()) {
            Entry::Occupied(_) => Err(DomainError::Conflict("Dialog already exists".into())),
            Entry::Vacant(slot) => {
                slot.insert(dialog.id);
                self.dialogs.insert(dialog.id, dialog.clone());
                Ok(dialog)
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dialog>> {
        Ok(self.dialogs.get(&id).map(|d| d.value().clone()))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Dialog>> {
        let mut dialogs: Vec<Dialog> = self
            .dialogs
            .iter()
            .filter(|d| d.has_participant(user_id))
            .map(|d| d.value().clone())
            .collect();
        dialogs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(dialogs)
    }

    async fn set_last_message(&self, dialog_id: Uuid, message_id: Uuid) -> Result<()> {
        let mut dialog = self
            .dialogs
            .get_mut(&dialog_id)
            .ok_or_else(|| DomainError::NotFound("Dialog not found".into()))?;
        dialog.last_message = Some(message_id);
        dialog.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.remove_dialog(id);
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn insert(&self, message: Message) -> Result<Message> {
        self.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.messages.get(&id).map(|m| m.value().clone()))
    }

    async fn mark_checked(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .messages
            .get_mut(&id)
            .is_some_and(|mut message| message.mark_checked()))
    }

    async fn push_attachment(&self, id: Uuid, file: Uuid, max: usize) -> Result<Option<Message>> {
        let mut message = self
            .messages
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound("Message not found".into()))?;
        if message.attachments.len() >= max {
            return Ok(None);
        }
        message.attachments.push(file);
        message.updated_at = Utc::now();
        Ok(Some(message.clone()))
    }

    async fn list_by_dialog(&self, dialog_id: Uuid) -> Result<Vec<Message>> {
        Ok(self.collect_messages(|m| m.dialog_id == dialog_id))
    }

    async fn list_by_sender(&self, sender_id: Uuid) -> Result<Vec<Message>> {
        Ok(self.collect_messages(|m| m.sender_id == sender_id))
    }
}

impl MemoryStore {
    /// Matching messages, oldest first.
    fn collect_messages(&self, keep: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut found: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| keep(m.value()))
            .map(|m| m.value().clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        found
    }
}

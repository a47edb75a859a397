//! # Domain Models
//!
//! These structs represent the core entities of Slim Chat.
//! Every record is keyed by a UUID v4 and carries UTC timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account.
///
/// `password_hash` and `confirm_hash` never leave the process: they are
/// skipped on serialization so a `User` can be returned to clients as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Stored lowercased; unique across all accounts.
    pub email: String,
    pub fullname: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub confirmed: bool,
    /// Single-use token embedded in the verification link.
    #[serde(skip_serializing, default)]
    pub confirm_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds an unconfirmed account from already-hashed credentials.
    pub fn new(email: &str, fullname: &str, password_hash: String, confirm_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            fullname: fullname.trim().to_string(),
            password_hash,
            confirmed: false,
            confirm_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Canonical form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A conversation between two users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialog {
    pub id: Uuid,
    pub author: Uuid,
    pub partner: Uuid,
    pub last_message: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dialog {
    pub fn new(author: Uuid, partner: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author,
            partner,
            last_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.author == user_id || self.partner == user_id
    }

    /// Identifies the participant pair regardless of who started the dialog.
    pub fn pair_key(&self) -> (Uuid, Uuid) {
        if self.author <= self.partner {
            (self.author, self.partner)
        } else {
            (self.partner, self.author)
        }
    }

    /// The participant on the other side of `user_id`, if `user_id` takes part.
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if self.author == user_id {
            Some(self.partner)
        } else if self.partner == user_id {
            Some(self.author)
        } else {
            None
        }
    }
}

/// The fundamental unit of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub dialog_id: Uuid,
    pub sender_id: Uuid,
    /// Unread flag from the recipient's point of view. Starts `true`,
    /// flips to `false` once and never back.
    pub unchecked: bool,
    /// Ordered references to uploaded files.
    pub attachments: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(dialog_id: Uuid, sender_id: Uuid, text: &str, attachments: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            dialog_id,
            sender_id,
            unchecked: true,
            attachments,
            created_at: now,
            updated_at: now,
        }
    }

    /// Clears the unread flag. Returns `false` when it was already cleared.
    pub fn mark_checked(&mut self) -> bool {
        if !self.unchecked {
            return false;
        }
        self.unchecked = false;
        self.updated_at = Utc::now();
        true
    }
}

/// A freshly signed claim handed back at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Repositories are the opaque document store: id lookup, filter queries
//! and single-document writes.

use async_trait::async_trait;
use uuid::Uuid;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::error::Result;
use crate::events::{ChatEvent, Email, OutboundEvent};
use crate::models::{Dialog, IssuedToken, Message, User};

/// Account persistence.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the e-mail is already taken.
    async fn insert(&self, user: User) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_confirm_hash(&self, hash: &str) -> Result<Option<User>>;
    /// Overwrites the stored document with the same id.
    async fn save(&self, user: &User) -> Result<()>;
    /// Case-insensitive substring match on fullname or e-mail.
    async fn search(&self, query: &str) -> Result<Vec<User>>;
    /// Removes and returns the account, `None` when absent.
    async fn delete(&self, id: Uuid) -> Result<Option<User>>;
}

/// Dialog persistence.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait DialogRepository: Send + Sync {
    /// Fails with `Conflict` when the two participants already share a
    /// dialog, whichever of them started it.
    async fn insert(&self, dialog: Dialog) -> Result<Dialog>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dialog>>;
    /// Dialogs the user takes part in, most recently updated first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Dialog>>;
    async fn set_last_message(&self, dialog_id: Uuid, message_id: Uuid) -> Result<()>;
    /// Removes the dialog together with its messages.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Message persistence. Listings are ordered by `created_at` ascending.
///
/// A stored message is never rewritten as a whole: each mutation touches
/// one field atomically so concurrent updates cannot undo each other.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: Message) -> Result<Message>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>>;
    /// Clears `unchecked`. `true` only for the call that made the
    /// transition; `false` when already read or absent.
    async fn mark_checked(&self, id: Uuid) -> Result<bool>;
    /// Appends `file` unless the message already holds `max` attachments,
    /// in which case `None` is returned. `NotFound` when absent.
    async fn push_attachment(&self, id: Uuid, file: Uuid, max: usize) -> Result<Option<Message>>;
    async fn list_by_dialog(&self, dialog_id: Uuid) -> Result<Vec<Message>>;
    async fn list_by_sender(&self, sender_id: Uuid) -> Result<Vec<Message>>;
}

/// One-way password primitive.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String>;
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Produces the single-use hash embedded in verification links.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait ConfirmHashGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Stateless claim issuance and verification.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: Uuid) -> Result<IssuedToken>;
    /// Recovers the user id or fails with `DomainError::InvalidToken`.
    fn verify(&self, token: &str) -> Result<Uuid>;
}

/// Non-blocking hand-off of side effects.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Outbox: Send + Sync {
    fn enqueue(&self, event: OutboundEvent) -> Result<()>;
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Real-time fan-out to session endpoints joined to a dialog.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Returns how many endpoints received the event; zero is not an error.
    async fn broadcast(&self, dialog_id: Uuid, event: &ChatEvent) -> Result<usize>;
}

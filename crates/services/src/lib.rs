//! # services
//!
//! Application logic for Slim Chat. Every service talks to the outside
//! world only through the ports defined in `domains`.

pub mod account;
pub mod dialogs;
pub mod dispatch;
pub mod messages;
pub mod validation;

pub use account::{AccountService, AccountSettings};
pub use dialogs::{DialogService, NewDialogInput};
pub use dispatch::{ChannelOutbox, OutboxWorker};
pub use messages::{MessageService, NewMessageInput};
pub use validation::{LoginInput, RegisterInput};

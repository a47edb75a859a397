use std::sync::Arc;

use domains::TokenService;
use services::{AccountService, DialogService, MessageService};

use crate::metrics::Metrics;
use crate::realtime::DialogHub;

/// State shared by every handler and the auth gate.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub dialogs: Arc<DialogService>,
    pub messages: Arc<MessageService>,
    pub tokens: Arc<dyn TokenService>,
    pub hub: Arc<DialogHub>,
    pub metrics: Arc<Metrics>,
}

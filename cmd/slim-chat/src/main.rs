//! # Slim Chat binary
//!
//! Assembles the application from settings and compile-time features:
//! settings → tracing → store → auth → outbox worker → services → router.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{build_router, AppState, DialogHub, Metrics};
use auth_adapters::{Argon2PasswordHasher, JwtTokenService, RandomConfirmHash};
use configs::{LogSettings, Settings, StorageBackend};
use domains::{DialogRepository, MessageRepository, UserRepository};
use secrecy::ExposeSecret;
use services::{
    AccountService, AccountSettings, ChannelOutbox, DialogService, MessageService, OutboxWorker,
};
use storage_adapters::{LogMailer, MemoryStore};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct Repositories {
    users: Arc<dyn UserRepository>,
    dialogs: Arc<dyn DialogRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl Repositories {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository + DialogRepository + MessageRepository + 'static,
    {
        Self {
            users: store.clone(),
            dialogs: store.clone(),
            messages: store,
        }
    }
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<Repositories> {
    match settings.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory store");
            Ok(Repositories::from_store(Arc::new(MemoryStore::new())))
        }
        #[cfg(feature = "db-postgres")]
        StorageBackend::Postgres => {
            let url = settings
                .storage
                .database_url
                .as_ref()
                .context("storage.database_url is not set")?;
            let store = storage_adapters::PgStore::connect(
                url.expose_secret(),
                settings.storage.max_connections,
            )
            .await
            .context("failed to open postgres store")?;
            Ok(Repositories::from_store(Arc::new(store)))
        }
        #[cfg(not(feature = "db-postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("postgres backend requested but the binary was built without db-postgres")
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = configs::load().context("failed to load settings")?;
    init_tracing(&settings.log);

    let repos = open_store(&settings).await?;

    let ttl = chrono::Duration::seconds(
        i64::try_from(settings.auth.token_ttl_secs).context("auth.token_ttl_secs is too large")?,
    );
    let tokens = Arc::new(JwtTokenService::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        ttl,
    ));

    let hub = Arc::new(DialogHub::new());
    let (outbox, outbox_rx) = ChannelOutbox::channel();
    let outbox = Arc::new(outbox);
    let worker = OutboxWorker::new(Arc::new(LogMailer::new(settings.mail.from.clone())), hub.clone());
    tokio::spawn(worker.run(outbox_rx));

    let accounts = AccountService::new(
        repos.users.clone(),
        Arc::new(Argon2PasswordHasher::new()),
        Arc::new(RandomConfirmHash),
        tokens.clone(),
        outbox.clone(),
        AccountSettings {
            verify_base_url: settings.mail.verify_base_url.trim_end_matches('/').to_string(),
            require_confirmed_login: settings.auth.require_confirmed_login,
        },
    );
    let dialogs = DialogService::new(
        repos.dialogs.clone(),
        repos.users.clone(),
        repos.messages.clone(),
        outbox.clone(),
    );
    let messages = MessageService::new(repos.messages.clone(), repos.dialogs.clone(), outbox);

    let state = AppState {
        accounts: Arc::new(accounts),
        dialogs: Arc::new(dialogs),
        messages: Arc::new(messages),
        tokens,
        hub,
        metrics: Arc::new(Metrics::new()),
    };
    let app = build_router(state);

    let addr = settings.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "slim-chat listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("slim-chat stopped");
    Ok(())
}

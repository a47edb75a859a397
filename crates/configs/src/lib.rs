//! # configs
//!
//! Typed process settings. Sources, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. `config/default.toml` when present,
//! 3. `SLIMCHAT__SECTION__KEY` environment variables (a `.env` file is
//!    loaded into the environment first).

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "SLIMCHAT";
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Source(#[from] config::ConfigError),

    #[error("auth.jwt_secret must be at least 16 bytes")]
    WeakSecret,

    #[error("storage.database_url is required for the postgres backend")]
    MissingDatabaseUrl,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub mail: MailSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default)]
    pub require_confirmed_login: bool,
}

fn default_token_ttl() -> u64 {
    7 * 24 * 60 * 60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub from: String,
    /// Origin prepended to `/user/verify?hash=...` in verification e-mails.
    pub verify_base_url: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from: "noreply@slimchat.local".into(),
            verify_base_url: "http://localhost:3000".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub database_url: Option<SecretString>,
    pub max_connections: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    pub filter: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=debug".into(),
            json: false,
        }
    }
}

impl Settings {
    /// Rejects settings the binary cannot safely start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        let has_url = self
            .storage
            .database_url
            .as_ref()
            .is_some_and(|url| !url.expose_secret().is_empty());
        if self.storage.backend == StorageBackend::Postgres && !has_url {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        Ok(())
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Loads `.env`, the optional file and the environment, then validates.
pub fn load() -> Result<Settings, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );
    Settings::from_builder(builder)
}

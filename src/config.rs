use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Deserialize;
use tracing::{debug, info};

use crate::schemas::AppState;
use crate::services::{
    dashboard::DashboardHub, mailer::Notifications, notifier::DownstreamNotifier,
    password::PasswordService, sessions::SessionManager, storage::FsObjectStore,
};

/// Runtime settings, layered from built-in defaults, an optional TOML file
/// and `POLIT__SECTION__KEY` environment variables (highest priority).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub password: PasswordSettings,
    pub reset: ResetSettings,
    pub admin: AdminSettings,
    pub smtp: Option<SmtpSettings>,
    pub storage: StorageSettings,
    pub downstream: DownstreamSettings,
    pub dashboard: DashboardSettings,
    pub cors: CorsSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    /// Pool of 10 plus an overflow of 20.
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://polit.db?mode=rwc".to_string(),
            max_connections: 30,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sessions older than this are expired. 7200 minutes is 5 days.
    pub timeout_minutes: i64,
    pub cleanup_interval_minutes: u64,
    pub cookie_name: String,
    /// Disable only for plain-HTTP local development.
    pub cookie_secure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_minutes: 7200,
            cleanup_interval_minutes: 60,
            cookie_name: "session_uuid".to_string(),
            cookie_secure: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub pbkdf2_rounds: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            pbkdf2_rounds: 600_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResetSettings {
    pub token_ttl_minutes: i64,
    /// Base of the link mailed to the user, `{base}/reset-password?token=...`.
    pub frontend_base_url: String,
    /// When false, an unknown email gets the same answer as a known one.
    pub reveal_unknown_email: bool,
}

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 60,
            frontend_base_url: "http://localhost:5173".to_string(),
            reveal_unknown_email: true,
        }
    }
}

/// Initial admin created at startup when no admin exists.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AdminSettings {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub root_dir: String,
    pub public_base_url: String,
    /// Key prefix of uploaded documents.
    pub folder: String,
    pub max_upload_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root_dir: "storage".to_string(),
            public_base_url: "http://localhost:3000/storage".to_string(),
            folder: "documents".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownstreamSettings {
    /// AI processing service told about new uploads.
    pub ai_upload_url: Option<String>,
    /// Search-index service told about deleted documents.
    pub index_purge_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DownstreamSettings {
    fn default() -> Self {
        Self {
            ai_upload_url: None,
            index_purge_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// IANA name of the zone the active-user buckets are laid out in.
    pub timezone: String,
    pub push_interval_secs: u64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            timezone: "Asia/Colombo".to_string(),
            push_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
}

impl Settings {
    /// Loads settings from `config_path` (or `polit.toml` in the working
    /// directory when present) and the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("polit").required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("POLIT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            )
            .build()?
            .try_deserialize()
    }
}

/// Opens the connection pool described by `settings`.
pub async fn connect_database(settings: &DatabaseSettings) -> Result<DatabaseConnection> {
    info!("Connecting to database: {}", settings.url);
    let mut options = ConnectOptions::new(settings.url.clone());
    options
        .max_connections(settings.max_connections)
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .sqlx_logging(false);

    Database::connect(options)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", settings.url))
}

/// Initialize application configuration and state
pub async fn initialize_app_state(settings: Settings) -> Result<AppState> {
    let db = connect_database(&settings.database).await?;
    build_app_state(db, settings)
}

/// Wires the process-wide services around an open connection.
pub fn build_app_state(db: DatabaseConnection, settings: Settings) -> Result<AppState> {
    // Zero periods would panic inside the background tickers.
    anyhow::ensure!(
        settings.session.cleanup_interval_minutes > 0,
        "session.cleanup_interval_minutes must be greater than zero"
    );
    anyhow::ensure!(
        settings.dashboard.push_interval_secs > 0,
        "dashboard.push_interval_secs must be greater than zero"
    );

    let tz = analytics::parse_time_zone(&settings.dashboard.timezone)
        .context("Invalid dashboard.timezone")?;
    debug!("Dashboard time zone: {}", tz);

    let notifications = Notifications::from_settings(settings.smtp.as_ref())
        .context("Failed to set up the SMTP transport")?;
    let notifier =
        DownstreamNotifier::new(&settings.downstream).context("Failed to build the HTTP client")?;

    Ok(AppState {
        passwords: PasswordService::new(settings.password.pbkdf2_rounds),
        sessions: SessionManager::new(db.clone(), settings.session.timeout_minutes),
        storage: Arc::new(FsObjectStore::from_settings(&settings.storage)),
        dashboard: DashboardHub::new(
            db.clone(),
            tz,
            Duration::from_secs(settings.dashboard.push_interval_secs),
        ),
        notifications,
        notifier,
        settings: Arc::new(settings),
        db,
    })
}

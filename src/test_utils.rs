use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderValue;
use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use model::entities::{role, user, user_detail};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::{Settings, build_app_state};
use crate::router::create_router;
use crate::schemas::AppState;
use crate::services::mailer::{Email, MailError, Mailer, Notifications};
use crate::services::password::PasswordService;
use crate::services::sessions::now;
use crate::services::storage::{ObjectStore, StorageError};

/// Cheap hashing for tests.
pub const TEST_PBKDF2_ROUNDS: u32 = 1_000;

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Inserts an active user with its profile and returns the user ID.
pub async fn insert_user(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    role_name: &str,
    is_temp_password: bool,
) -> i32 {
    let role = role::Entity::find()
        .filter(role::Column::Name.eq(role_name))
        .one(db)
        .await
        .unwrap()
        .expect("role is seeded");
    let password_hash = PasswordService::new(TEST_PBKDF2_ROUNDS).hash(password).unwrap();

    let user = user::ActiveModel {
        username: Set(email.to_string()),
        password_hash: Set(password_hash),
        role_id: Set(role.id),
        status: Set(true),
        is_temp_password: Set(is_temp_password),
        created_date: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create test user");

    user_detail::ActiveModel {
        user_id: Set(user.id),
        email: Set(email.to_string()),
        full_name: Set(format!("Test {}", role_name)),
        status: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create test user detail");

    user.id
}

/// Mailer that keeps every email in memory.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits until at least `count` emails went out. Delivery runs on
    /// detached tasks.
    pub async fn wait_for(&self, count: usize) -> Vec<Email> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} email(s), got {:?}", count, self.sent());
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Object store whose deletes always fail.
pub struct UndeletableStore {
    pub inner: Arc<dyn ObjectStore>,
}

#[async_trait]
impl ObjectStore for UndeletableStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.inner.put(key, bytes, content_type).await
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only bucket",
        )))
    }
}

/// Settings for tests: cheap hashing, plain-HTTP cookies and a private
/// storage directory.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.password.pbkdf2_rounds = TEST_PBKDF2_ROUNDS;
    settings.session.cookie_secure = false;
    settings.session.timeout_minutes = 60;
    settings.storage.root_dir = tempfile::tempdir()
        .expect("Failed to create storage dir")
        .into_path()
        .to_string_lossy()
        .into_owned();
    settings.storage.public_base_url = "http://files.test".to_string();
    settings.dashboard.push_interval_secs = 1;
    settings
}

/// Create AppState for testing, with a mailer that records instead of sending
pub async fn setup_test_app_state() -> (AppState, RecordingMailer) {
    setup_test_app_state_with(test_settings()).await
}

pub async fn setup_test_app_state_with(settings: Settings) -> (AppState, RecordingMailer) {
    let db = setup_test_db().await;
    let mut state = build_app_state(db, settings).expect("Failed to build test state");

    let mailer = RecordingMailer::default();
    state.notifications = Notifications::new(Arc::new(mailer.clone()));
    (state, mailer)
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is determined by the RUST_LOG environment variable,
/// defaulting to WARN if not set.
pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| match level.to_uppercase().as_str() {
            "ERROR" => Some(Level::ERROR),
            "WARN" => Some(Level::WARN),
            "INFO" => Some(Level::INFO),
            "DEBUG" => Some(Level::DEBUG),
            "TRACE" => Some(Level::TRACE),
            _ => None,
        })
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Running test server plus handles to its state.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub mailer: RecordingMailer,
    _tracing: tracing::subscriber::DefaultGuard,
}

/// Create a test server over a fresh database
pub async fn setup_test_app() -> TestApp {
    setup_test_app_from(setup_test_app_state().await).await
}

pub async fn setup_test_app_from((state, mailer): (AppState, RecordingMailer)) -> TestApp {
    let tracing = init_test_tracing();
    let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");
    TestApp {
        server,
        state,
        mailer,
        _tracing: tracing,
    }
}

impl TestApp {
    /// `Cookie` header carrying a session token.
    pub fn cookie_for(&self, token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!(
            "{}={}",
            self.state.settings.session.cookie_name, token
        ))
        .unwrap()
    }

    /// Inserts a user and opens a session for them. Returns the user ID and
    /// the `Cookie` header to send.
    pub async fn signed_in(&self, email: &str, role_name: &str) -> (i32, HeaderValue) {
        let user_id = insert_user(&self.state.db, email, "password-123", role_name, false).await;
        let token = self.state.sessions.create_session(user_id).await.unwrap();
        (user_id, self.cookie_for(&token))
    }
}

pub mod cleanup;
pub mod credentials;
pub mod dashboard;
pub mod mailer;
pub mod notifier;
pub mod password;
pub mod sessions;
pub mod storage;
pub mod templates;
pub mod uploads;
pub mod users;

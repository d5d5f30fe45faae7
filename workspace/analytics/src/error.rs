use thiserror::Error;

/// Error types for the analytics module
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Configured time zone is not a known IANA name
    #[error("Unknown time zone: {0}")]
    TimeZone(String),

    /// A calendar computation fell outside the representable range
    #[error("Date error: {0}")]
    Date(String),
}

/// Type alias for Result with AnalyticsError
pub type Result<T> = std::result::Result<T, AnalyticsError>;

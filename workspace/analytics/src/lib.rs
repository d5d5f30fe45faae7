//! Dashboard aggregation over the session table and the analytics tables
//! written by the AI backend.
//!
//! Each metric is split into a pure function over already-loaded rows and an
//! async query that loads the rows and applies it, so the math is testable
//! without a database.

pub mod activity;
pub mod error;
pub mod queries;
pub mod sessions;

pub use activity::{active_users, parse_time_zone};
pub use error::{AnalyticsError, Result};
pub use queries::{gap_in_queries, most_referenced_files, searches_per_user, top_queries};
pub use sessions::average_session_length;

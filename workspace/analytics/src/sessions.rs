use chrono::{Datelike, Month, NaiveDate, NaiveDateTime};
use common::AverageSessionLength;
use model::entities::{role, session, user};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait,
};
use tracing::{debug, info, instrument};

use crate::error::{AnalyticsError, Result};

/// Mean length in seconds of the closed sessions. 0 when there are none.
pub fn average_duration_secs(sessions: &[session::Model]) -> f64 {
    let durations: Vec<f64> = sessions
        .iter()
        .filter_map(|s| s.duration())
        .map(|d| d.num_milliseconds() as f64 / 1000.0)
        .collect();

    if durations.is_empty() {
        return 0.0;
    }
    durations.iter().sum::<f64>() / durations.len() as f64
}

/// Relative change in percent, rounded to two decimals.
/// With no previous value the change is 100 when anything happened, else 0.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    let change = if previous == 0.0 {
        if current > 0.0 { 100.0 } else { 0.0 }
    } else {
        (current - previous) / previous * 100.0
    };
    (change * 100.0).round() / 100.0
}

/// Formats seconds as `"{m}m {s}s"`, dropping the fraction.
pub fn format_duration(secs: f64) -> String {
    let whole = secs.max(0.0) as i64;
    format!("{}m {}s", whole / 60, whole % 60)
}

pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Half-open `[first day, first day of next month)` range of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AnalyticsError::Date(format!("invalid month {year}-{month}")))?;
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AnalyticsError::Date(format!("invalid month {next_year}-{next_month}")))?;
    Ok((start, end))
}

fn month_name(month: u32) -> Result<&'static str> {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .ok_or_else(|| AnalyticsError::Date(format!("invalid month number {month}")))
}

/// Closed sessions of non-admin users that started within the given month.
#[instrument(skip(db))]
async fn closed_sessions_in_month(
    db: &DatabaseConnection,
    year: i32,
    month: u32,
) -> Result<Vec<session::Model>> {
    let (start, end) = month_bounds(year, month)?;

    let sessions = session::Entity::find()
        .join(JoinType::InnerJoin, session::Relation::User.def())
        .join(JoinType::InnerJoin, user::Relation::Role.def())
        .filter(role::Column::Name.ne(role::ADMIN))
        .filter(session::Column::EndTime.is_not_null())
        .filter(session::Column::StartTime.gte(start))
        .filter(session::Column::StartTime.lt(end))
        .all(db)
        .await?;

    debug!("Fetched {} closed sessions for {}-{}", sessions.len(), year, month);
    Ok(sessions)
}

/// Average session length of the month containing `now` (UTC) compared with
/// the month before.
#[instrument(skip(db))]
pub async fn average_session_length(
    db: &DatabaseConnection,
    now: NaiveDateTime,
) -> Result<AverageSessionLength> {
    let (year, month) = (now.year(), now.month());
    let (prev_year, prev_month) = previous_month(year, month);

    let current = closed_sessions_in_month(db, year, month).await?;
    let previous = closed_sessions_in_month(db, prev_year, prev_month).await?;

    let current_avg = average_duration_secs(&current);
    let previous_avg = average_duration_secs(&previous);
    info!(
        "Average session length: current={}s previous={}s",
        current_avg, previous_avg
    );

    Ok(AverageSessionLength {
        current_month: month_name(month)?.to_string(),
        average_session_length_seconds: current_avg,
        formatted: format_duration(current_avg),
        percentage_change_vs_last_month: percent_change(current_avg, previous_avg),
    })
}

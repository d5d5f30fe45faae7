use std::collections::HashSet;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use common::{ActiveUsersPoint, Granularity};
use model::entities::{role, session, user};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QuerySelect,
    RelationTrait,
};
use tracing::{debug, instrument};

use crate::error::{AnalyticsError, Result};

/// A labelled UTC interval `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub label: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// (user_id, start_time, end_time)
pub type SessionSpan = (i32, NaiveDateTime, Option<NaiveDateTime>);

pub fn parse_time_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| AnalyticsError::TimeZone(format!("{name}: {e}")))
}

/// UTC instant of `hour:00` local time on `day`.
fn local_to_utc(day: NaiveDate, hour: u32, tz: &Tz) -> Result<NaiveDateTime> {
    let local = day
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| AnalyticsError::Date(format!("invalid hour {hour}")))?;
    tz.from_local_datetime(&local)
        .earliest()
        .map(|zoned| zoned.naive_utc())
        .ok_or_else(|| AnalyticsError::Date(format!("{local} does not exist in {tz}")))
}

fn day_buckets(today: NaiveDate, days: u64, tz: &Tz) -> Result<Vec<Bucket>> {
    (0..days)
        .rev()
        .map(|back| {
            let day = today
                .checked_sub_days(Days::new(back))
                .ok_or_else(|| AnalyticsError::Date(format!("{today} minus {back} days")))?;
            let next = day
                .succ_opt()
                .ok_or_else(|| AnalyticsError::Date(format!("no day after {day}")))?;
            Ok(Bucket {
                label: day.format("%b %d").to_string(),
                start: local_to_utc(day, 0, tz)?,
                end: local_to_utc(next, 0, tz)?,
            })
        })
        .collect()
}

/// Buckets for `granularity`, laid out on the local calendar of `tz` and
/// expressed in UTC.
pub fn buckets(granularity: Granularity, now: DateTime<Utc>, tz: &Tz) -> Result<Vec<Bucket>> {
    let today = now.with_timezone(tz).date_naive();

    match granularity {
        Granularity::Daily => (0..24)
            .map(|hour| {
                let start = local_to_utc(today, hour, tz)?;
                Ok(Bucket {
                    label: format!("{hour:02}:00"),
                    start,
                    end: start + Duration::hours(1),
                })
            })
            .collect(),
        Granularity::Weekly => day_buckets(today, 7, tz),
        Granularity::Monthly => day_buckets(today, 30, tz),
    }
}

/// Distinct users whose session overlaps the bucket.
pub fn count_active(sessions: &[SessionSpan], bucket: &Bucket) -> u64 {
    sessions
        .iter()
        .filter(|(_, start, end)| {
            *start < bucket.end && end.is_none_or(|end| end >= bucket.start)
        })
        .map(|(user_id, _, _)| *user_id)
        .collect::<HashSet<_>>()
        .len() as u64
}

pub fn active_users_per_bucket(sessions: &[SessionSpan], buckets: &[Bucket]) -> Vec<ActiveUsersPoint> {
    buckets
        .iter()
        .map(|bucket| ActiveUsersPoint {
            period: bucket.label.clone(),
            active_users: count_active(sessions, bucket),
        })
        .collect()
}

/// Active users (role `user`) per bucket of the requested granularity.
#[instrument(skip(db, tz))]
pub async fn active_users(
    db: &DatabaseConnection,
    granularity: Granularity,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Vec<ActiveUsersPoint>> {
    let buckets = buckets(granularity, now, tz)?;
    let (Some(first), Some(last)) = (buckets.first(), buckets.last()) else {
        return Ok(Vec::new());
    };

    let sessions: Vec<SessionSpan> = session::Entity::find()
        .select_only()
        .column(session::Column::UserId)
        .column(session::Column::StartTime)
        .column(session::Column::EndTime)
        .join(JoinType::InnerJoin, session::Relation::User.def())
        .join(JoinType::InnerJoin, user::Relation::Role.def())
        .filter(role::Column::Name.eq(role::USER))
        .filter(session::Column::StartTime.lt(last.end))
        .filter(
            Condition::any()
                .add(session::Column::EndTime.is_null())
                .add(session::Column::EndTime.gte(first.start)),
        )
        .into_tuple()
        .all(db)
        .await?;

    debug!(
        "Loaded {} sessions overlapping {} {} buckets",
        sessions.len(),
        buckets.len(),
        granularity
    );

    Ok(active_users_per_bucket(&sessions, &buckets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, insert_session, insert_user, setup_db};

    fn colombo() -> Tz {
        parse_time_zone("Asia/Colombo").unwrap()
    }

    fn now() -> DateTime<Utc> {
        // 01:30 on March 11 in Colombo (UTC+05:30)
        Utc.from_utc_datetime(&at(2025, 3, 10, 20, 0))
    }

    #[test]
    fn test_unknown_time_zone_is_rejected() {
        assert!(matches!(
            parse_time_zone("Mars/Olympus"),
            Err(AnalyticsError::TimeZone(_))
        ));
    }

    #[test]
    fn test_daily_buckets_follow_local_calendar() {
        let buckets = buckets(Granularity::Daily, now(), &colombo()).unwrap();

        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[0].label, "00:00");
        assert_eq!(buckets[0].start, at(2025, 3, 10, 18, 30));
        assert_eq!(buckets[0].end, at(2025, 3, 10, 19, 30));
        assert_eq!(buckets[23].label, "23:00");
        assert_eq!(buckets[23].end, at(2025, 3, 11, 18, 30));
    }

    #[test]
    fn test_weekly_and_monthly_buckets() {
        let weekly = buckets(Granularity::Weekly, now(), &colombo()).unwrap();
        let labels: Vec<_> = weekly.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Mar 05", "Mar 06", "Mar 07", "Mar 08", "Mar 09", "Mar 10", "Mar 11"]
        );
        assert_eq!(weekly[6].start, at(2025, 3, 10, 18, 30));
        assert_eq!(weekly[6].end - weekly[6].start, Duration::days(1));

        let monthly = buckets(Granularity::Monthly, now(), &colombo()).unwrap();
        assert_eq!(monthly.len(), 30);
        assert_eq!(monthly[0].label, "Feb 10");
        assert_eq!(monthly[29].label, "Mar 11");
    }

    #[test]
    fn test_count_active_overlap_rules() {
        let bucket = Bucket {
            label: "10:00".to_string(),
            start: at(2025, 3, 1, 10, 0),
            end: at(2025, 3, 1, 11, 0),
        };
        let sessions = vec![
            // ends exactly at bucket start: counted
            (1, at(2025, 3, 1, 9, 0), Some(at(2025, 3, 1, 10, 0))),
            // starts exactly at bucket end: not counted
            (2, at(2025, 3, 1, 11, 0), None),
            // open since before: counted
            (3, at(2025, 3, 1, 8, 0), None),
            // same user twice: counted once
            (3, at(2025, 3, 1, 10, 15), Some(at(2025, 3, 1, 10, 20))),
            // ended before: not counted
            (4, at(2025, 3, 1, 8, 0), Some(at(2025, 3, 1, 9, 59))),
        ];
        assert_eq!(count_active(&sessions, &bucket), 2);
    }

    #[tokio::test]
    async fn test_active_users_daily_counts_only_user_role() {
        let db = setup_db().await;
        let alice = insert_user(&db, "alice@example.com", role::USER).await;
        let bob = insert_user(&db, "bob@example.com", role::USER).await;
        let admin = insert_user(&db, "admin@example.com", role::ADMIN).await;

        // Local 00:15-00:40
        insert_session(&db, alice, at(2025, 3, 10, 18, 45), Some(at(2025, 3, 10, 19, 10))).await;
        // Local 01:05-01:20 and 01:25-01:30, same user
        insert_session(&db, alice, at(2025, 3, 10, 19, 35), Some(at(2025, 3, 10, 19, 50))).await;
        insert_session(&db, alice, at(2025, 3, 10, 19, 55), Some(at(2025, 3, 10, 20, 0))).await;
        // Local 01:10, still open
        insert_session(&db, bob, at(2025, 3, 10, 19, 40), None).await;
        insert_session(&db, admin, at(2025, 3, 10, 18, 40), None).await;
        // Yesterday, closed: outside the window
        insert_session(&db, bob, at(2025, 3, 9, 10, 0), Some(at(2025, 3, 9, 11, 0))).await;

        let points = active_users(&db, Granularity::Daily, now(), &colombo())
            .await
            .unwrap();

        assert_eq!(points.len(), 24);
        assert_eq!(points[0].period, "00:00");
        assert_eq!(points[0].active_users, 1);
        assert_eq!(points[1].active_users, 2);
        assert_eq!(points[5].active_users, 1);
        assert_eq!(points[23].active_users, 1);
    }
}

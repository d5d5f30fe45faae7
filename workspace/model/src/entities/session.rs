use chrono::{Duration, NaiveDateTime};
use sea_orm::entity::prelude::*;

/// A login session keyed by the opaque token carried in the session cookie.
/// The session is active while `end_time` is null.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub session_uuid: String,
    pub user_id: i32,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Whether the session outlived `timeout` at instant `now`.
    pub fn is_expired_at(&self, now: NaiveDateTime, timeout: Duration) -> bool {
        now - self.start_time > timeout
    }

    /// Length of a closed session. `None` while the session is active.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn session(end_time: Option<NaiveDateTime>) -> Model {
        Model {
            id: 1,
            session_uuid: "token".to_string(),
            user_id: 7,
            start_time: at(8, 0),
            end_time,
        }
    }

    #[test]
    fn test_active_session_has_no_duration() {
        let s = session(None);
        assert!(s.is_active());
        assert_eq!(s.duration(), None);
    }

    #[test]
    fn test_closed_session_duration() {
        let s = session(Some(at(9, 30)));
        assert!(!s.is_active());
        assert_eq!(s.duration(), Some(Duration::minutes(90)));
    }

    #[test]
    fn test_expiry_is_strictly_after_timeout() {
        let s = session(None);
        assert!(!s.is_expired_at(at(9, 0), Duration::hours(1)));
        assert!(s.is_expired_at(at(9, 1), Duration::hours(1)));
    }
}

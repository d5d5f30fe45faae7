//! Payloads of the dashboard endpoints and WebSocket topics.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Average length of closed sessions this month compared with last month.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AverageSessionLength {
    /// English month name, e.g. `March`.
    pub current_month: String,
    pub average_session_length_seconds: f64,
    /// `"{m}m {s}s"`
    pub formatted: String,
    pub percentage_change_vs_last_month: f64,
}

/// Bucket size of the active-users series.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// 24 hourly buckets of today.
    #[default]
    Daily,
    /// The last 7 days.
    Weekly,
    /// The last 30 days.
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ActiveUsersPoint {
    /// `HH:MM` for hourly buckets, `Mon DD` for daily ones.
    pub period: String,
    pub active_users: u64,
}

/// Message pushed on the `active-users` topic.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ActiveUsersSnapshot {
    pub granularity: Granularity,
    pub data: Vec<ActiveUsersPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TopQueryItem {
    pub source: String,
    pub topic: Option<String>,
    pub count: i32,
    pub query: String,
    pub llm_response: String,
}

/// Queries sharing a topic, most asked first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TopQueryGroup {
    pub topic: Option<String>,
    pub queries: Vec<TopQueryItem>,
}

/// Number of unanswerable queries for a topic.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DocumentGapCount {
    pub main_topic: Option<String>,
    pub count: i64,
}

/// How often a source document was referenced in answers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ReferencedFile {
    pub source: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SearchesPerUser {
    pub total_searches: i64,
    pub unique_users: i64,
    pub average: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_wire_format() {
        let parsed: Granularity = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(parsed, Granularity::Weekly);
        assert_eq!(Granularity::default(), Granularity::Daily);
        assert_eq!(
            serde_json::to_string(&Granularity::Monthly).unwrap(),
            "\"monthly\""
        );
        assert!(serde_json::from_str::<Granularity>("\"yearly\"").is_err());
    }

    #[test]
    fn test_login_response_omits_user_when_absent() {
        let response = crate::LoginResponse {
            msg: "Login successful".to_string(),
            redirect_to_change_password: true,
            user: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("user").is_none());
        assert_eq!(json["redirect_to_change_password"], true);
    }
}

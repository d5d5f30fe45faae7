use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use common::{ActiveUsersSnapshot, Granularity};
use sea_orm::DatabaseConnection;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, trace, warn};

use crate::errors::{AppError, AppResult};

const CHANNEL_CAPACITY: usize = 16;

/// Dashboard metrics pushed over WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    AverageSessionLength,
    ActiveUsers,
    TopQueries,
    GapInQueries,
    MostReferencedFiles,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::AverageSessionLength,
        Topic::ActiveUsers,
        Topic::TopQueries,
        Topic::GapInQueries,
        Topic::MostReferencedFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::AverageSessionLength => "average-session-length",
            Topic::ActiveUsers => "active-users",
            Topic::TopQueries => "top-queries",
            Topic::GapInQueries => "gap-in-queries",
            Topic::MostReferencedFiles => "most-referenced-files",
        }
    }
}

impl FromStr for Topic {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| AppError::NotFound(format!("Unknown dashboard topic '{s}'")))
    }
}

/// Per-topic broadcast channels. The first subscriber of a topic starts its
/// publisher, which recomputes the snapshot on every tick while anyone
/// listens.
#[derive(Clone)]
pub struct DashboardHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    db: DatabaseConnection,
    tz: Tz,
    interval: Duration,
    channels: Mutex<HashMap<Topic, broadcast::Sender<String>>>,
    publishers: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DashboardHub {
    pub fn new(db: DatabaseConnection, tz: Tz, interval: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                db,
                tz,
                interval,
                channels: Mutex::new(HashMap::new()),
                publishers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn time_zone(&self) -> &Tz {
        &self.inner.tz
    }

    /// Current JSON payload of a topic.
    pub async fn snapshot(&self, topic: Topic) -> AppResult<String> {
        compute_snapshot(&self.inner.db, &self.inner.tz, topic).await
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<String> {
        let mut channels = lock(&self.inner.channels);
        if let Some(sender) = channels.get(&topic) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        channels.insert(topic, sender.clone());

        info!("Starting dashboard publisher for {}", topic.as_str());
        let handle = tokio::spawn(publish(
            self.inner.db.clone(),
            self.inner.tz,
            self.inner.interval,
            topic,
            sender,
        ));
        lock(&self.inner.publishers).push(handle);
        receiver
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        lock(&self.inner.channels)
            .get(&topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Stops every publisher. Subscribers see their channel close.
    pub fn shutdown(&self) {
        for handle in lock(&self.inner.publishers).drain(..) {
            handle.abort();
        }
        lock(&self.inner.channels).clear();
        debug!("Dashboard publishers stopped");
    }
}

#[instrument(skip(db, tz))]
async fn compute_snapshot(db: &DatabaseConnection, tz: &Tz, topic: Topic) -> AppResult<String> {
    let json = match topic {
        Topic::AverageSessionLength => {
            let data = analytics::average_session_length(db, Utc::now().naive_utc()).await?;
            serde_json::to_string(&data)
        }
        Topic::ActiveUsers => {
            let data = analytics::active_users(db, Granularity::Daily, Utc::now(), tz).await?;
            serde_json::to_string(&ActiveUsersSnapshot {
                granularity: Granularity::Daily,
                data,
            })
        }
        Topic::TopQueries => serde_json::to_string(&analytics::top_queries(db).await?),
        Topic::GapInQueries => serde_json::to_string(&analytics::gap_in_queries(db).await?),
        Topic::MostReferencedFiles => {
            serde_json::to_string(&analytics::most_referenced_files(db).await?)
        }
    };
    json.map_err(|e| AppError::Internal(format!("Failed to serialize {}: {e}", topic.as_str())))
}

async fn publish(
    db: DatabaseConnection,
    tz: Tz,
    interval: Duration,
    topic: Topic,
    sender: broadcast::Sender<String>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if sender.receiver_count() == 0 {
            trace!("No subscribers on {}, skipping", topic.as_str());
            continue;
        }

        match compute_snapshot(&db, &tz, topic).await {
            Ok(json) => {
                // Only fails when the last subscriber left in the meantime.
                let _ = sender.send(json);
            }
            Err(e) => warn!("Failed to compute {} snapshot: {}", topic.as_str(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[test]
    fn test_topic_slugs() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
        assert!(matches!(
            "most_referenced_file".parse::<Topic>(),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribers_receive_periodic_snapshots() {
        let db = setup_test_db().await;
        let hub = DashboardHub::new(db, chrono_tz::Asia::Colombo, Duration::from_millis(20));

        let mut first = hub.subscribe(Topic::GapInQueries);
        let mut second = hub.subscribe(Topic::GapInQueries);
        assert_eq!(hub.subscriber_count(Topic::GapInQueries), 2);

        for receiver in [&mut first, &mut second] {
            let message = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
                .await
                .expect("no snapshot pushed")
                .unwrap();
            assert_eq!(message, "[]");
        }

        hub.shutdown();
        assert_eq!(hub.subscriber_count(Topic::GapInQueries), 0);
    }

    #[tokio::test]
    async fn test_active_users_snapshot_has_granularity() {
        let db = setup_test_db().await;
        let hub = DashboardHub::new(db, chrono_tz::Asia::Colombo, Duration::from_secs(60));

        let json = hub.snapshot(Topic::ActiveUsers).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["granularity"], "daily");
        assert_eq!(value["data"].as_array().unwrap().len(), 24);
    }
}

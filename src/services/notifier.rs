use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::DownstreamSettings;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No endpoint configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct DocumentPayload<'a> {
    file_path: &'a str,
}

/// Best-effort callbacks to the AI processing and search-index services.
#[derive(Debug, Clone)]
pub struct DownstreamNotifier {
    client: reqwest::Client,
    ai_upload_url: Option<String>,
    index_purge_url: Option<String>,
}

impl DownstreamNotifier {
    pub fn new(settings: &DownstreamSettings) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            ai_upload_url: settings.ai_upload_url.clone(),
            index_purge_url: settings.index_purge_url.clone(),
        })
    }

    /// Tells the AI backend to ingest the document at `file_url`.
    pub async fn document_uploaded(&self, file_url: &str) -> Result<(), NotifyError> {
        self.post(self.ai_upload_url.as_deref(), file_url).await
    }

    /// Tells the search index to forget the document at `file_url`.
    pub async fn document_deleted(&self, file_url: &str) -> Result<(), NotifyError> {
        self.post(self.index_purge_url.as_deref(), file_url).await
    }

    #[instrument(skip(self))]
    async fn post(&self, endpoint: Option<&str>, file_url: &str) -> Result<(), NotifyError> {
        let Some(endpoint) = endpoint else {
            debug!("Downstream endpoint not configured, skipping callback");
            return Err(NotifyError::NotConfigured);
        };

        let response = self
            .client
            .post(endpoint)
            .json(&DocumentPayload { file_path: file_url })
            .send()
            .await?
            .error_for_status();

        match response {
            Ok(response) => {
                info!("Downstream {} answered {}", endpoint, response.status());
                Ok(())
            }
            Err(e) => {
                warn!("Downstream {} rejected callback: {}", endpoint, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> DownstreamSettings {
        DownstreamSettings {
            ai_upload_url: Some(format!("{}/ingest", server.uri())),
            index_purge_url: Some(format!("{}/purge", server.uri())),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_upload_callback_posts_file_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(body_json(serde_json::json!({"file_path": "http://files/a.pdf"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = DownstreamNotifier::new(&settings(&server)).unwrap();
        notifier.document_uploaded("http://files/a.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/purge"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = DownstreamNotifier::new(&settings(&server)).unwrap();
        assert!(matches!(
            notifier.document_deleted("http://files/a.pdf").await,
            Err(NotifyError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint() {
        let notifier = DownstreamNotifier::new(&DownstreamSettings::default()).unwrap();
        assert!(matches!(
            notifier.document_uploaded("http://files/a.pdf").await,
            Err(NotifyError::NotConfigured)
        ));
    }
}

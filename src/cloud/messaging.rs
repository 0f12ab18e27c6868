//! Push notification dispatch.
//!
//! Alerts are sent to a topic through the messaging HTTP v1 API. Delivery is
//! best effort: one attempt, no retry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::DEFAULT_REQUEST_TIMEOUT;
use super::auth::TokenSource;
use crate::error::DispatchError;
use crate::model::AlertPayload;

/// Base URL for the messaging API.
const MESSAGING_API_BASE: &str = "https://fcm.googleapis.com";

/// Sends alerts to subscribers of a topic.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Send `alert` and return the delivery receipt id.
    async fn dispatch(&self, alert: &AlertPayload) -> Result<String, DispatchError>;
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    topic: &'a str,
    notification: Notification<'a>,
    data: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Notification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

/// Dispatcher for a messaging project.
#[derive(Clone)]
pub struct PushDispatcher {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Arc<dyn TokenSource>,
    timeout: Duration,
}

impl PushDispatcher {
    pub fn new(project_id: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_base_url(MESSAGING_API_BASE, project_id, tokens)
    }

    /// Create a dispatcher with a custom base URL (for emulators and testing).
    pub fn with_base_url(base_url: &str, project_id: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            tokens,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound each send request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.project_id
        )
    }
}

#[async_trait]
impl AlertDispatcher for PushDispatcher {
    async fn dispatch(&self, alert: &AlertPayload) -> Result<String, DispatchError> {
        let token = self.tokens.access_token().await?;
        let request = SendRequest {
            message: Message {
                topic: &alert.topic,
                notification: Notification {
                    title: &alert.title,
                    body: &alert.body,
                },
                data: &alert.data,
            },
        };

        let response = self
            .client
            .post(self.send_url())
            .timeout(self.timeout)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let sent: SendResponse = response.json().await?;
        info!(topic = %alert.topic, receipt = %sent.name, "Alert sent");
        Ok(sent.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::auth::StaticToken;
    use crate::model::PublishedArtifact;

    #[test]
    fn test_send_url() {
        let dispatcher = PushDispatcher::new("geofence-demo", Arc::new(StaticToken("t".into())));
        assert_eq!(
            dispatcher.send_url(),
            "https://fcm.googleapis.com/v1/projects/geofence-demo/messages:send"
        );
    }

    #[test]
    fn test_request_shape() {
        let alert = AlertPayload::motion(
            "geofenceAlert",
            &PublishedArtifact {
                remote_key: "photos/a.jpg".to_string(),
                public_url: "https://example.test/a.jpg".to_string(),
            },
        );
        let request = SendRequest {
            message: Message {
                topic: &alert.topic,
                notification: Notification {
                    title: &alert.title,
                    body: &alert.body,
                },
                data: &alert.data,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"]["topic"], "geofenceAlert");
        assert_eq!(json["message"]["notification"]["title"], "Motion Detected");
        assert_eq!(json["message"]["data"]["imageUrl"], "https://example.test/a.jpg");
    }
}

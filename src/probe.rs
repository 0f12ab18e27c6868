//! Arm-state probe.
//!
//! The sentry is armed by an external boolean flag served over HTTP, e.g. a
//! realtime-database path such as `.../geofence/isActive.json`. The flag is
//! fetched once per tick.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::model::ArmState;

/// Source of the arm state.
///
/// Implementations never fail: any error is folded into [`ArmState::Unknown`].
#[async_trait]
pub trait StateProbe: Send + Sync {
    async fn arm_state(&self) -> ArmState;
}

/// Probe that GETs the flag URL.
#[derive(Clone)]
pub struct HttpStateProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpStateProbe {
    /// Create a probe for `url`. Every request is bounded by `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Fetch the flag, distinguishing transport failures from a served value.
    pub async fn fetch(&self) -> Result<ArmState, ProbeError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if status != 200 {
            return Err(ProbeError::Status(status));
        }

        // A body that is not JSON at all is an error; JSON of the wrong shape
        // is a served value that simply does not arm.
        serde_json::from_str::<serde_json::Value>(&body)?;

        Ok(ArmState::from_response(status, &body))
    }
}

#[async_trait]
impl StateProbe for HttpStateProbe {
    async fn arm_state(&self) -> ArmState {
        match self.fetch().await {
            Ok(state) => {
                debug!(state = ?state, "Arm state fetched");
                state
            }
            Err(e) => {
                warn!(error = %e, "Arm state unavailable, treating as unknown");
                ArmState::Unknown
            }
        }
    }
}

//! Capture → upload → notify for one admitted motion event.
//!
//! Each stage returns a `Result` and the first failure short-circuits the
//! rest. Nothing is retried. A failure is logged here and reported as a
//! [`PipelineOutcome`]; it never reaches the control loop.
//!
//! ```text
//! Capturing ──► Uploading ──► Notifying ──► Done
//!     │             │             │
//!     └─────────────┴─────────────┴──► Failed(stage)
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::camera::CaptureService;
use crate::cloud::{AlertDispatcher, ArtifactPublisher};
use crate::error::{CaptureError, DispatchError, PublishError};
use crate::model::{AlertPayload, MotionEvent, PipelineOutcome, PipelineStage};
use crate::retention::{LocalRetention, RetentionPolicy};

/// The stage that stopped an execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("upload failed: {0}")]
    Publish(#[from] PublishError),

    #[error("alert failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Capture(_) => PipelineStage::Capturing,
            PipelineError::Publish(_) => PipelineStage::Uploading,
            PipelineError::Dispatch(_) => PipelineStage::Notifying,
        }
    }
}

/// Turns motion events into a stored photo, a public URL and an alert.
///
/// Executions share no mutable state apart from the camera, which
/// [`CaptureService`] serializes.
#[derive(Clone)]
pub struct EventPipeline {
    capture: CaptureService,
    publisher: Arc<dyn ArtifactPublisher>,
    dispatcher: Arc<dyn AlertDispatcher>,
    topic: String,
    retention: Arc<LocalRetention>,
}

impl EventPipeline {
    pub fn new(
        capture: CaptureService,
        publisher: Arc<dyn ArtifactPublisher>,
        dispatcher: Arc<dyn AlertDispatcher>,
        topic: &str,
        retention: RetentionPolicy,
    ) -> Self {
        let retention = Arc::new(LocalRetention::new(retention, capture.save_dir()));

        Self {
            capture,
            publisher,
            dispatcher,
            topic: topic.to_string(),
            retention,
        }
    }

    pub fn capture_service(&self) -> &CaptureService {
        &self.capture
    }

    /// Run one execution to a terminal state.
    #[instrument(skip(self, event), fields(file = %event.file_name()))]
    pub async fn execute(&self, event: MotionEvent) -> PipelineOutcome {
        match self.run(&event).await {
            Ok(receipt) => {
                info!(receipt = %receipt, "Motion event reported");
                PipelineOutcome::Done
            }
            Err(e @ PipelineError::Dispatch(_)) => {
                // The photo is already public; only the alert is lost.
                warn!(error = %e, "Motion event published without alert");
                PipelineOutcome::Failed(e.stage())
            }
            Err(e) => {
                error!(stage = ?e.stage(), error = %e, "Motion event pipeline failed");
                PipelineOutcome::Failed(e.stage())
            }
        }
    }

    async fn run(&self, event: &MotionEvent) -> Result<String, PipelineError> {
        let captured = self.capture.capture(&event.file_name()).await?;

        let published = self.publisher.publish(&captured).await?;

        self.retention.apply(&captured).await;

        let alert = AlertPayload::motion(&self.topic, &published);
        let receipt = self.dispatcher.dispatch(&alert).await?;

        Ok(receipt)
    }
}

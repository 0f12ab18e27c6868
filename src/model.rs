//! Data model for the sentry.
//!
//! Nothing here is persisted. Arm state and motion readings live for a single
//! tick; a [`MotionEvent`] lives for a single pipeline execution.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use tokio::time::Instant;

/// Remote prefix under which every photo is stored.
pub const REMOTE_PREFIX: &str = "photos";

/// Title of every motion alert.
pub const ALERT_TITLE: &str = "Motion Detected";

/// Body of every motion alert.
pub const ALERT_BODY: &str = "A photo has been captured by the sentry camera.";

/// Whether perimeter monitoring should respond to motion.
///
/// Derived fresh on every tick. `Unknown` is handled exactly like `Disarmed`:
/// nothing is captured while the state cannot be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    Armed,
    Disarmed,
    Unknown,
}

impl ArmState {
    /// Derive the state from a flag response.
    ///
    /// Only status 200 with a body that is the JSON literal `true` arms the
    /// sentry. A JSON `false` disarms it; any other status or body shape is
    /// `Unknown`.
    pub fn from_response(status: u16, body: &str) -> Self {
        if status != 200 {
            return ArmState::Unknown;
        }

        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Bool(true)) => ArmState::Armed,
            Ok(serde_json::Value::Bool(false)) => ArmState::Disarmed,
            _ => ArmState::Unknown,
        }
    }

    pub fn is_armed(self) -> bool {
        self == ArmState::Armed
    }
}

/// A motion reading that was admitted as a reportable event.
///
/// `detected_at` is monotonic and drives the cooldown; `wall_clock` only names
/// the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionEvent {
    pub detected_at: Instant,
    pub wall_clock: DateTime<Local>,
}

impl MotionEvent {
    pub fn new(detected_at: Instant, wall_clock: DateTime<Local>) -> Self {
        Self {
            detected_at,
            wall_clock,
        }
    }

    /// File name for this event's photo, with second resolution.
    ///
    /// Two events in the same second share a name and the later capture
    /// overwrites the earlier one. The cooldown keeps that from happening in
    /// normal operation.
    pub fn file_name(&self) -> String {
        format!("motion_{}.jpg", self.wall_clock.format("%Y%m%d_%H%M%S"))
    }
}

/// A photo written to local storage by the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedArtifact {
    pub path: PathBuf,
    pub file_name: String,
}

impl CapturedArtifact {
    /// Object key the artifact is uploaded under, e.g. `photos/motion_20250101_120000.jpg`.
    pub fn remote_key(&self) -> String {
        format!("{}/{}", REMOTE_PREFIX, self.file_name)
    }
}

/// An uploaded artifact with its public URL. Never changes once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub remote_key: String,
    pub public_url: String,
}

/// A motion alert addressed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPayload {
    pub topic: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl AlertPayload {
    /// Build the alert for a published photo.
    pub fn motion(topic: &str, artifact: &PublishedArtifact) -> Self {
        let mut data = BTreeMap::new();
        data.insert("imageUrl".to_string(), artifact.public_url.clone());

        Self {
            topic: topic.to_string(),
            title: ALERT_TITLE.to_string(),
            body: ALERT_BODY.to_string(),
            data,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        self.data.get("imageUrl").map(String::as_str)
    }
}

/// Stages of one pipeline execution, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Capturing,
    Uploading,
    Notifying,
}

/// Terminal state of one pipeline execution.
///
/// `Failed(Notifying)` is still a complete execution: the photo is durable and
/// public, only the alert is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Done,
    Failed(PipelineStage),
}

impl PipelineOutcome {
    /// Whether the photo reached storage.
    pub fn is_published(self) -> bool {
        matches!(
            self,
            PipelineOutcome::Done | PipelineOutcome::Failed(PipelineStage::Notifying)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_only_literal_true_arms() {
        assert_eq!(ArmState::from_response(200, "true"), ArmState::Armed);
        assert_eq!(ArmState::from_response(200, " true\n"), ArmState::Armed);
        assert_eq!(ArmState::from_response(200, "false"), ArmState::Disarmed);
        assert_eq!(ArmState::from_response(200, "\"true\""), ArmState::Unknown);
        assert_eq!(ArmState::from_response(200, "1"), ArmState::Unknown);
        assert_eq!(ArmState::from_response(200, "null"), ArmState::Unknown);
        assert_eq!(ArmState::from_response(200, "{\"isActive\":true}"), ArmState::Unknown);
        assert_eq!(ArmState::from_response(200, ""), ArmState::Unknown);
        assert_eq!(ArmState::from_response(500, "true"), ArmState::Unknown);
        assert_eq!(ArmState::from_response(404, "false"), ArmState::Unknown);
    }

    #[test]
    fn test_file_name_is_sortable_to_the_second() {
        let wall = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 2).unwrap();
        let event = MotionEvent::new(Instant::now(), wall);

        assert_eq!(event.file_name(), "motion_20250307_090502.jpg");
    }

    #[test]
    fn test_remote_key_uses_photos_prefix() {
        let artifact = CapturedArtifact {
            path: PathBuf::from("/tmp/motion_20250307_090502.jpg"),
            file_name: "motion_20250307_090502.jpg".to_string(),
        };

        assert_eq!(artifact.remote_key(), "photos/motion_20250307_090502.jpg");
    }

    #[test]
    fn test_alert_carries_public_url() {
        let published = PublishedArtifact {
            remote_key: "photos/a.jpg".to_string(),
            public_url: "https://storage.googleapis.com/bucket/photos/a.jpg".to_string(),
        };

        let alert = AlertPayload::motion("geofenceAlert", &published);

        assert_eq!(alert.topic, "geofenceAlert");
        assert_eq!(alert.title, ALERT_TITLE);
        assert_eq!(alert.image_url(), Some(published.public_url.as_str()));
        assert_eq!(alert.data.len(), 1);
    }

    #[test]
    fn test_failed_alert_is_still_published() {
        assert!(PipelineOutcome::Done.is_published());
        assert!(PipelineOutcome::Failed(PipelineStage::Notifying).is_published());
        assert!(!PipelineOutcome::Failed(PipelineStage::Uploading).is_published());
        assert!(!PipelineOutcome::Failed(PipelineStage::Capturing).is_published());
    }
}

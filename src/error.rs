//! Error types for the sentry.
//!
//! Each collaborator has its own error so a failure can be attributed to the
//! tick or pipeline stage it happened in. None of these ever escape the
//! control loop; they are logged where they occur.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The arm-state query failed. Always treated as [`ArmState::Unknown`].
///
/// [`ArmState::Unknown`]: crate::model::ArmState::Unknown
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("state request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("state endpoint returned status {0}")]
    Status(u16),

    #[error("state body is not JSON: {0}")]
    Body(#[from] serde_json::Error),
}

/// Reading the motion sensor failed. Treated as "no motion" for the tick.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("gpio {line}: {source}")]
    Io {
        line: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("gpio {line} returned unexpected value {value:?}")]
    InvalidValue { line: u32, value: String },

    #[error("board pin {0} is not a GPIO pin")]
    NotGpio(u8),

    #[error("sensor has been released")]
    Released,
}

/// The camera could not produce an image. The pipeline stops before upload.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("camera command exited with {status}: {stderr}")]
    Command { status: String, stderr: String },

    #[error("camera is not started")]
    NotStarted,

    #[error("camera produced no file at {0}")]
    Missing(PathBuf),

    #[error("capture did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Token minting for the cloud APIs failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("cannot read credentials {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("cannot sign assertion: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),

    #[error("token exchange failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Uploading the captured artifact failed. No alert is sent.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sending the alert failed. The published artifact stays published.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("send request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("messaging returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A configuration value is missing or malformed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

//! Cloud collaborators: authentication, object storage and push messaging.
//!
//! - [`auth`]: service-account token minting
//! - [`storage`]: uploads photos and returns their public URL
//! - [`messaging`]: sends motion alerts to a topic

use std::time::Duration;

pub mod auth;
pub mod messaging;
pub mod storage;

pub use auth::{ServiceAccountKey, ServiceAccountTokenSource, StaticToken, TokenSource};
pub use messaging::{AlertDispatcher, PushDispatcher};
pub use storage::{ArtifactPublisher, CloudStoragePublisher};

/// Upper bound on one cloud request, from connect to the end of the body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

//! Camera control and still capture.
//!
//! The camera is a single physical device shared by every pipeline execution.
//! [`CaptureService`] owns it behind a mutex held for one whole capture, so
//! overlapping executions queue for the camera instead of interleaving
//! start/stop calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CaptureError;
use crate::model::CapturedArtifact;

/// Upper bound on a single capture call.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Still-capture settings applied by [`Camera::configure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillConfig {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for StillConfig {
    fn default() -> Self {
        Self {
            width: 2304,
            height: 1296,
            quality: 93,
        }
    }
}

/// A still camera: `configure → start → capture → stop`, then `close` once.
#[async_trait]
pub trait Camera: Send {
    async fn configure(&mut self, config: &StillConfig) -> Result<(), CaptureError>;
    async fn start(&mut self) -> Result<(), CaptureError>;
    async fn capture(&mut self, path: &Path) -> Result<(), CaptureError>;
    async fn stop(&mut self) -> Result<(), CaptureError>;
    async fn close(&mut self);
}

/// Camera driven through a still-capture command line tool such as
/// `rpicam-still`. Dropping a capture in progress kills the command.
#[derive(Debug)]
pub struct CommandCamera {
    program: String,
    config: StillConfig,
    active: bool,
}

impl CommandCamera {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            config: StillConfig::default(),
            active: false,
        }
    }

    fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--nopreview")
            .arg("--immediate")
            .arg("--width")
            .arg(self.config.width.to_string())
            .arg("--height")
            .arg(self.config.height.to_string())
            .arg("--quality")
            .arg(self.config.quality.to_string())
            .arg("--output")
            .arg(path)
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn configure(&mut self, config: &StillConfig) -> Result<(), CaptureError> {
        self.config = config.clone();
        Ok(())
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        self.active = true;
        Ok(())
    }

    async fn capture(&mut self, path: &Path) -> Result<(), CaptureError> {
        if !self.active {
            return Err(CaptureError::NotStarted);
        }

        let output = self.command(path).output().await?;
        if !output.status.success() {
            return Err(CaptureError::Command {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !tokio::fs::try_exists(path).await? {
            return Err(CaptureError::Missing(path.to_path_buf()));
        }

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.active = false;
        Ok(())
    }

    async fn close(&mut self) {
        self.active = false;
        debug!(program = %self.program, "Camera closed");
    }
}

/// Produces photos for pipeline executions.
#[derive(Clone)]
pub struct CaptureService {
    camera: Arc<Mutex<Box<dyn Camera>>>,
    save_dir: PathBuf,
    settle_delay: Duration,
    capture_timeout: Duration,
}

impl CaptureService {
    /// Configure `camera` for stills and wrap it.
    pub async fn new(
        mut camera: Box<dyn Camera>,
        config: &StillConfig,
        save_dir: impl Into<PathBuf>,
        settle_delay: Duration,
    ) -> Result<Self, CaptureError> {
        let save_dir = save_dir.into();
        tokio::fs::create_dir_all(&save_dir).await?;
        camera.configure(config).await?;

        Ok(Self {
            camera: Arc::new(Mutex::new(camera)),
            save_dir,
            settle_delay,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
        })
    }

    /// Give up on a capture call after `timeout`. The camera is still stopped.
    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Take one photo named `file_name` in the save directory.
    ///
    /// The camera is started, given the settle delay, captured from and
    /// stopped. It is stopped even when the capture fails or times out.
    pub async fn capture(&self, file_name: &str) -> Result<CapturedArtifact, CaptureError> {
        let path = self.save_dir.join(file_name);
        let mut camera = self.camera.lock().await;

        camera.start().await?;
        tokio::time::sleep(self.settle_delay).await;
        let captured = tokio::time::timeout(self.capture_timeout, camera.capture(&path))
            .await
            .unwrap_or(Err(CaptureError::TimedOut(self.capture_timeout)));

        if let Err(e) = camera.stop().await {
            warn!(error = %e, "Failed to stop camera");
        }
        drop(camera);

        captured?;
        info!(path = %path.display(), "Image captured");

        Ok(CapturedArtifact {
            path,
            file_name: file_name.to_string(),
        })
    }

    /// Release the camera device. Waits for any capture in progress.
    pub async fn close(&self) {
        self.camera.lock().await.close().await;
    }
}

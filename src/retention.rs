//! Cleanup of local photos once they are durable in object storage.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::model::CapturedArtifact;

/// What happens to local copies after a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Never delete anything.
    KeepAll,
    /// Delete each photo as soon as it is uploaded.
    DeleteAfterUpload,
    /// Keep only the newest `n` uploaded photos.
    KeepLatest(usize),
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::KeepLatest(100)
    }
}

impl FromStr for RetentionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-all" => Ok(RetentionPolicy::KeepAll),
            "delete-after-upload" => Ok(RetentionPolicy::DeleteAfterUpload),
            other => match other.strip_prefix("keep-latest:") {
                Some(n) => n
                    .parse()
                    .map(RetentionPolicy::KeepLatest)
                    .map_err(|e| format!("bad count in `{other}`: {e}")),
                None => Err(format!(
                    "expected `keep-all`, `delete-after-upload` or `keep-latest:<n>`, got `{other}`"
                )),
            },
        }
    }
}

/// Applies a [`RetentionPolicy`] to the photos this process has uploaded.
///
/// Only photos recorded as published are ever deleted. A photo whose upload
/// failed is the only copy of it and stays on disk, as does anything left in
/// the save directory by an earlier run.
#[derive(Debug)]
pub struct LocalRetention {
    policy: RetentionPolicy,
    save_dir: PathBuf,
    published: Mutex<BTreeSet<String>>,
}

impl LocalRetention {
    pub fn new(policy: RetentionPolicy, save_dir: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            save_dir: save_dir.into(),
            published: Mutex::new(BTreeSet::new()),
        }
    }

    /// Apply the policy after `artifact` was uploaded. Errors are logged only.
    pub async fn apply(&self, artifact: &CapturedArtifact) {
        match self.policy {
            RetentionPolicy::KeepAll => {}
            RetentionPolicy::DeleteAfterUpload => remove(&artifact.path).await,
            RetentionPolicy::KeepLatest(keep) => {
                for name in self.record(&artifact.file_name, keep).await {
                    remove(&self.save_dir.join(name)).await;
                }
            }
        }
    }

    /// Record `file_name` as published and return the published photos that
    /// fall outside the newest `keep`. File names sort chronologically.
    async fn record(&self, file_name: &str, keep: usize) -> Vec<String> {
        let mut published = self.published.lock().await;
        published.insert(file_name.to_string());

        let excess = published.len().saturating_sub(keep);
        let expired: Vec<String> = published.iter().take(excess).cloned().collect();
        for name in &expired {
            published.remove(name);
        }
        expired
    }
}

async fn remove(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Local photo removed"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove local photo"),
    }
}

//! Scoped output directory with atomic publication.
//!
//! Workload output is written under a private staging directory during a
//! run. Only when the run commits does the staging directory get renamed to
//! the caller-visible path; a dropped (uncommitted) scope discards its
//! staged contents. Downstream tooling therefore never observes a partial
//! result set at the published path.

use crate::error::DriverError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A staging directory bound to its eventual publish location.
#[derive(Debug)]
pub struct StagedDir {
    staging: PathBuf,
    publish_to: PathBuf,
    committed: bool,
}

impl StagedDir {
    /// Open a staging directory that will publish to `publish_to` on commit.
    ///
    /// The publish target must not already exist. A stale staging directory
    /// left behind by a crashed run is removed and recreated.
    pub fn begin(publish_to: &Path) -> Result<Self, DriverError> {
        if publish_to.exists() {
            return Err(DriverError::OutputExists(publish_to.to_path_buf()));
        }
        let name = publish_to.file_name().ok_or_else(|| {
            DriverError::Config(format!(
                "invalid output directory: {}",
                publish_to.display()
            ))
        })?;
        let staging =
            publish_to.with_file_name(format!(".{}.staging", name.to_string_lossy()));

        if staging.exists() {
            warn!(staging = %staging.display(), "removing stale staging directory");
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        debug!(
            staging = %staging.display(),
            publish_to = %publish_to.display(),
            "opened staging directory"
        );
        Ok(Self {
            staging,
            publish_to: publish_to.to_path_buf(),
            committed: false,
        })
    }

    /// The staging path workloads write into.
    pub fn path(&self) -> &Path {
        &self.staging
    }

    /// The path contents will be published to.
    pub fn publish_target(&self) -> &Path {
        &self.publish_to
    }

    /// Atomically publish the staged contents. Returns the published path.
    pub fn commit(mut self) -> Result<PathBuf, DriverError> {
        if let Some(parent) = self.publish_to.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::rename(&self.staging, &self.publish_to)?;
        self.committed = true;
        debug!(published = %self.publish_to.display(), "published output directory");
        Ok(self.publish_to.clone())
    }
}

impl Drop for StagedDir {
    fn drop(&mut self) {
        if !self.committed && self.staging.exists() {
            warn!(
                staging = %self.staging.display(),
                "discarding unpublished staging directory"
            );
            let _ = fs::remove_dir_all(&self.staging);
        }
    }
}

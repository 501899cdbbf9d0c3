//! Filesystem utilities for the conversion pipeline: per-request working
//! directories and output discovery.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConversionError;

/// An exclusively owned scratch directory for one conversion request.
///
/// Released explicitly with [`WorkingDirectory::release`]; if the owner is
/// dropped first (panic, cancelled future), `Drop` removes the tree
/// synchronously.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
    released: bool,
}

impl WorkingDirectory {
    /// Create a fresh `job__<uuidv7>` directory under `root`.
    pub async fn create(root: &Path) -> Result<Self, ConversionError> {
        let path = root.join(format!("job__{}", Uuid::now_v7().simple()));
        tokio::fs::create_dir_all(&path).await?;
        debug!(dir = %path.display(), "Working directory created");
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Write `bytes` to `name` inside the directory.
    pub async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ConversionError> {
        let target = self.join(name);
        tokio::fs::write(&target, bytes).await?;
        Ok(target)
    }

    /// Remove the directory and everything in it. Best-effort: failures are
    /// logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(dir = %self.path.display(), "Working directory removed"),
            Err(e) => warn!(
                dir = %self.path.display(),
                error = %e,
                "Failed to clean up working directory"
            ),
        }
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        dir = %self.path.display(),
                        error = %e,
                        "Failed to clean up abandoned working directory"
                    );
                }
            }
        }
    }
}

/// Finds the file a converter actually produced.
///
/// Converter builds disagree on output naming: some honour an explicit
/// output path, others derive the name from the input. The heuristic is
/// fixed: the expected path if it exists, otherwise the first direct entry
/// of the directory (listing order) whose extension matches, ignoring case.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactLocator;

impl ArtifactLocator {
    /// Locate the artifact for `expected` inside `dir`.
    pub async fn locate(
        expected: &Path,
        dir: &Path,
    ) -> Result<Option<PathBuf>, ConversionError> {
        if tokio::fs::metadata(expected)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Ok(Some(expected.to_path_buf()));
        }

        let wanted = match expected.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => return Ok(None),
        };

        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase() == wanted)
                .unwrap_or(false);

            if matches && entry.file_type().await?.is_file() {
                debug!(
                    expected = %expected.display(),
                    found = %path.display(),
                    "Artifact found under alternate name"
                );
                return Ok(Some(path));
            }
        }

        Ok(None)
    }
}

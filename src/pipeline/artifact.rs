//! Transient on-disk PNG artifacts for reasoning-service submission.
//!
//! A [`TransientArtifact`] owns exactly one temporary file. The analysis
//! boundary hands it back through [`TransientArtifact::release`], which
//! retries a bounded number of times with an async backoff (some platforms
//! keep a file locked briefly after its last handle closes). If the owner is
//! dropped instead (service error propagated with `?`, cancelled future,
//! unwinding), `Drop` makes a single non-blocking attempt. Whatever cannot
//! be removed is handed to the process-exit cleanup list.
//!
//! The exit list is drained by [`flush_deferred`], which the binary runs
//! through an [`ExitCleanup`] guard held for the lifetime of `main`.

use crate::config::CleanupPolicy;
use crate::error::{CleanupWarning, MedScanError};
use crate::pipeline::encode::{encode_png, png_image_data};
use edgequake_llm::ImageData;
use image::DynamicImage;
use once_cell::sync::Lazy;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

static DEFERRED: Lazy<Mutex<Vec<PathBuf>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A per-request temporary PNG file.
#[derive(Debug)]
pub struct TransientArtifact {
    path: PathBuf,
    policy: CleanupPolicy,
    released: bool,
}

impl TransientArtifact {
    /// Write `img` as PNG to a fresh temporary file in `dir` (system temp
    /// directory when `None`).
    ///
    /// The file handle is closed before returning so only the path is held.
    pub fn write_png(
        img: &DynamicImage,
        dir: Option<&Path>,
        policy: CleanupPolicy,
    ) -> Result<Self, MedScanError> {
        let png = encode_png(img)?;
        let mut builder = tempfile::Builder::new();
        builder.prefix("medscan-").suffix(".png");
        let mut tmp = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| MedScanError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(&png)
            .map_err(|e| MedScanError::Internal(format!("tempfile write: {e}")))?;

        // Disarm tempfile's own delete-on-drop: release is ours to manage.
        let (file, path) = tmp
            .keep()
            .map_err(|e| MedScanError::Internal(format!("tempfile keep: {e}")))?;
        drop(file);

        debug!("Wrote transient artifact {} ({} bytes)", path.display(), png.len());
        Ok(Self {
            path,
            policy,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the artifact back as a vision-request image attachment.
    pub async fn load_image_data(&self) -> Result<ImageData, MedScanError> {
        let png = tokio::fs::read(&self.path).await.map_err(|e| {
            MedScanError::Internal(format!(
                "failed to read artifact {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(png_image_data(&png))
    }

    /// Delete the artifact with the configured retry policy.
    ///
    /// On failure the path is already queued for exit cleanup; the warning
    /// is returned for logging only.
    pub async fn release(mut self) -> Result<(), CleanupWarning> {
        self.released = true;
        let result = remove_with_retry(&self.path, self.policy).await;
        if let Err(ref warning) = result {
            defer_until_exit(warning.path.clone());
        }
        result
    }
}

impl Drop for TransientArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_now(&self.path) {
            warn!(
                "Could not remove transient file '{}': {e}; deferring removal to process exit",
                self.path.display()
            );
            defer_until_exit(self.path.clone());
        }
    }
}

/// Single delete attempt. A path that is already gone counts as removed.
fn remove_now(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Delete `path`, retrying up to `policy.attempts` times.
///
/// Backoff sleeps on the tokio timer, never on the worker thread.
pub async fn remove_with_retry(path: &Path, policy: CleanupPolicy) -> Result<(), CleanupWarning> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) if attempt >= attempts => {
                return Err(CleanupWarning {
                    path: path.to_path_buf(),
                    attempts,
                    source: e,
                });
            }
            Err(e) => {
                debug!(
                    "Removing {} failed (attempt {}/{}): {}",
                    path.display(),
                    attempt,
                    attempts,
                    e
                );
                tokio::time::sleep(Duration::from_millis(policy.backoff_ms)).await;
            }
        }
    }
}

/// Queue `path` for removal when the process exits.
pub fn defer_until_exit(path: PathBuf) {
    let mut list = DEFERRED.lock().unwrap_or_else(|p| p.into_inner());
    if !list.contains(&path) {
        list.push(path);
    }
}

/// Paths currently waiting for the exit cleanup.
pub fn deferred_paths() -> Vec<PathBuf> {
    DEFERRED
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .clone()
}

/// Best-effort removal of every deferred path. Returns how many were removed.
///
/// The list is emptied whatever the outcome; paths that still cannot be
/// removed are logged and left behind.
pub fn flush_deferred() -> usize {
    let paths = std::mem::take(&mut *DEFERRED.lock().unwrap_or_else(|p| p.into_inner()));
    let mut removed = 0;
    for path in paths {
        match remove_now(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Leaving {} behind: {}", path.display(), e),
        }
    }
    removed
}

/// Runs [`flush_deferred`] when dropped.
///
/// Hold one in `main` so deferred artifacts are cleaned up at exit.
#[derive(Debug, Default)]
pub struct ExitCleanup;

impl Drop for ExitCleanup {
    fn drop(&mut self) {
        let n = flush_deferred();
        if n > 0 {
            debug!("Exit cleanup removed {} deferred artifact(s)", n);
        }
    }
}

//! Workspace management: a scratch directory per generation request.
//!
//! ## Why a structured scope?
//!
//! Every generation request needs a private directory for the materialised
//! document and the engine's byproducts (`.aux`, `.log`, the PDF itself).
//! [`with_workspace`] owns the whole lifecycle: create, hand the path to the
//! caller's future, then remove on every exit path. Callers cannot forget
//! cleanup because they never own the directory.
//!
//! Removal failures are logged and swallowed. By the time cleanup runs the
//! request has already produced its PDF or its error, and a transient file
//! lock must not turn a success into a failure. The `TempDir` guard is kept
//! alive across the caller's future, so even a panic unwinds through its
//! `Drop` and the directory still goes away.

use crate::config::GenerationConfig;
use crate::error::FillError;
use std::future::Future;
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Run `f` with a fresh workspace directory, removing it afterwards.
///
/// The directory is uniquely named (`texfill-` prefix) and exclusively owned
/// by this request. `f`'s result passes through untouched; cleanup cannot
/// fail the request.
pub async fn with_workspace<T, F, Fut>(config: &GenerationConfig, f: F) -> Result<T, FillError>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T, FillError>>,
{
    let temp_dir = tempfile::Builder::new()
        .prefix("texfill-")
        .tempdir()
        .map_err(|e| FillError::Internal(format!("failed to create workspace: {e}")))?;
    debug!(path = %temp_dir.path().display(), "workspace created");

    let result = f(temp_dir.path().to_path_buf()).await;

    remove_with_retries(temp_dir, config).await;
    result
}

/// Remove the workspace, retrying a bounded number of times.
///
/// Transient locks (a slow engine child still flushing its log, an antivirus
/// scanner holding the directory) usually clear within milliseconds. The
/// final fallback is the `TempDir` drop itself, which ignores errors.
async fn remove_with_retries(temp_dir: tempfile::TempDir, config: &GenerationConfig) {
    let path = temp_dir.path().to_path_buf();
    let attempts = config.cleanup_retries.max(1);

    for attempt in 1..=attempts {
        let target = path.clone();
        let removed =
            tokio::task::spawn_blocking(move || std::fs::remove_dir_all(&target)).await;

        match removed {
            Ok(Ok(())) => {
                debug!(path = %path.display(), "workspace removed");
                return;
            }
            Ok(Err(e)) => {
                debug!(attempt, error = %e, "workspace removal failed");
            }
            Err(e) => {
                debug!(attempt, error = %e, "workspace removal task panicked");
            }
        }

        if attempt < attempts {
            sleep(Duration::from_millis(config.cleanup_backoff_ms)).await;
        }
    }

    warn!(
        path = %path.display(),
        retries = attempts,
        "could not remove workspace; leaving it for OS temp cleanup"
    );
}

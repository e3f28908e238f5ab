//! Physical moves with index commit on success.

use crate::{LocationIndex, StorageBackend};
use darkroom_core::{AssetId, Checksum, StoragePath};
use darkroom_error::{DarkroomResult, MoveError, MoveErrorKind};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry2::{Retry, RetryError, strategy::ExponentialBackoff, strategy::jitter};
use tracing::{debug, error, info, instrument, warn};

/// Backoff settings for transient filesystem errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RetryPolicy {
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    max_delay_ms: u64,
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    max_retries: usize,
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_max_retries() -> usize {
    3
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(initial_backoff_ms: u64, max_delay_ms: u64, max_retries: usize) -> Self {
        Self {
            initial_backoff_ms,
            max_delay_ms,
            max_retries,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            default_initial_backoff_ms(),
            default_max_delay_ms(),
            default_max_retries(),
        )
    }
}

/// Moves asset files and commits their new location.
///
/// A move is only attempted after the target was reserved. On failure the
/// index keeps the old path and the reservation is released; on success
/// the index points at the new path before the call returns.
#[derive(Debug, Clone)]
pub struct Mover {
    backend: Arc<dyn StorageBackend>,
    index: Arc<LocationIndex>,
    retry: RetryPolicy,
}

impl Mover {
    /// Create a mover.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        index: Arc<LocationIndex>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            index,
            retry,
        }
    }

    /// The filesystem backend.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Move `asset_id` from `from` to the reserved path `to`.
    ///
    /// When `from == to` only the index is updated, which records a file
    /// that is already in place.
    ///
    /// # Errors
    ///
    /// A [`MoveError`] if the filesystem operation fails (after retries for
    /// transient kinds), or a storage error if the index commit fails, in
    /// which case the file is moved back.
    #[instrument(skip(self, checksum), fields(asset_id = %asset_id, from = %from, to = %to))]
    pub async fn move_asset(
        &self,
        asset_id: AssetId,
        from: &StoragePath,
        to: &StoragePath,
        checksum: Checksum,
    ) -> DarkroomResult<()> {
        if from == to {
            self.index.commit(asset_id, to.clone(), checksum).await?;
            debug!("File already in place, index updated");
            return Ok(());
        }

        if let Err(e) = self.transfer_with_retry(from, to, checksum).await {
            self.index.release(asset_id, to);
            warn!(error = %e, "Move failed, index unchanged");
            return Err(e.into());
        }

        if let Err(e) = self.index.commit(asset_id, to.clone(), checksum).await {
            error!(error = %e, "Index commit failed, moving file back");
            if let Err(undo) = self.backend.rename(to, from).await {
                error!(error = %undo, "Could not restore file to its previous path");
            }
            self.index.release(asset_id, to);
            return Err(e.into());
        }

        if let Err(e) = self.backend.prune_empty_parents(from).await {
            debug!(error = %e, "Could not prune empty directories");
        }

        info!("Moved asset");
        Ok(())
    }

    async fn transfer_with_retry(
        &self,
        from: &StoragePath,
        to: &StoragePath,
        checksum: Checksum,
    ) -> Result<(), MoveError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.retry.initial_backoff_ms)
            .factor(2)
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .map(jitter)
            .take(self.retry.max_retries);

        let backend = self.backend.as_ref();
        Retry::spawn(retry_strategy, move || async move {
            match transfer(backend, from, to, checksum).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind.is_retryable() => {
                    warn!(error = %e, "Transient move failure, will retry");
                    Err(RetryError::Transient {
                        err: e,
                        retry_after: None,
                    })
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        })
        .await
    }
}

async fn transfer(
    backend: &dyn StorageBackend,
    from: &StoragePath,
    to: &StoragePath,
    checksum: Checksum,
) -> Result<(), MoveError> {
    let source_present = backend
        .exists(from)
        .await
        .map_err(|e| MoveError::from_io(&e, from.as_str()))?;
    if !source_present {
        return Err(MoveError::new(MoveErrorKind::SourceMissing(from.to_string())));
    }

    // The backend refuses to replace a file, this only reports it early
    let target_present = backend
        .exists(to)
        .await
        .map_err(|e| MoveError::from_io(&e, to.as_str()))?;
    if target_present {
        return Err(MoveError::new(MoveErrorKind::TargetOccupied(to.to_string())));
    }

    backend
        .create_parent_dirs(to)
        .await
        .map_err(|e| MoveError::from_io(&e, format!("create parent of {}", to)))?;

    match backend.rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("Rename crosses devices, copying instead");
            copy_across(backend, from, to, checksum).await
        }
        // A concurrent prune can remove the freshly created target directory
        Err(e) if e.kind() == io::ErrorKind::NotFound && backend.exists(from).await.unwrap_or(false) => {
            Err(MoveError::new(MoveErrorKind::Transient(format!(
                "target directory of {} vanished",
                to
            ))))
        }
        Err(e) => Err(MoveError::from_io(&e, format!("rename {} to {}", from, to))),
    }
}

/// Copy, verify, then delete the source. Leaves no copy behind on failure.
async fn copy_across(
    backend: &dyn StorageBackend,
    from: &StoragePath,
    to: &StoragePath,
    checksum: Checksum,
) -> Result<(), MoveError> {
    if let Err(e) = backend.copy(from, to).await {
        // An existing target is not ours to delete
        if e.kind() != io::ErrorKind::AlreadyExists {
            let _ = backend.remove_file(to).await;
        }
        return Err(MoveError::from_io(&e, format!("copy {} to {}", from, to)));
    }

    let copied = match backend.checksum(to).await {
        Ok(sum) => sum,
        Err(e) => {
            let _ = backend.remove_file(to).await;
            return Err(MoveError::from_io(&e, format!("verify {}", to)));
        }
    };
    if copied != checksum {
        let _ = backend.remove_file(to).await;
        return Err(MoveError::new(MoveErrorKind::ChecksumMismatch(format!(
            "{}: expected {}, got {}",
            to, checksum, copied
        ))));
    }

    if let Err(e) = backend.remove_file(from).await {
        let _ = backend.remove_file(to).await;
        return Err(MoveError::from_io(&e, format!("remove {}", from)));
    }
    Ok(())
}

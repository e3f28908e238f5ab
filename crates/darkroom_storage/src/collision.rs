//! Collision resolution: candidate path → unique reserved path.

use crate::LocationIndex;
use crate::index::Reservation;
use darkroom_core::{AssetId, Checksum, StoragePath};
use darkroom_error::{ReserveError, ReserveErrorKind};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Default bound on suffix probes before giving up.
pub const DEFAULT_MAX_SUFFIX: u32 = 10_000;

/// Reserves unique paths in a [`LocationIndex`].
///
/// Probing and reserving happen inside the index's critical section. Given
/// the same index state the outcome is always the same: the candidate
/// first, then `_1`, `_2`, ... in order.
#[derive(Debug, Clone)]
pub struct CollisionResolver {
    index: Arc<LocationIndex>,
    max_suffix: u32,
}

impl CollisionResolver {
    /// Create a resolver over `index` that probes at most `max_suffix`
    /// suffixed variants.
    pub fn new(index: Arc<LocationIndex>, max_suffix: u32) -> Self {
        Self { index, max_suffix }
    }

    /// The index this resolver reserves in.
    pub fn index(&self) -> &Arc<LocationIndex> {
        &self.index
    }

    /// Reserve `candidate`, or the first free suffixed variant of it, for
    /// `asset_id`.
    ///
    /// A path already held by `asset_id` is returned as is. Any other
    /// reservation the asset holds is dropped, so an asset has at most one
    /// outstanding reservation.
    ///
    /// # Errors
    ///
    /// - `DuplicateDetected` when a probed path belongs to a different asset
    ///   with the same checksum. Nothing is reserved.
    /// - `ExhaustedSuffixSpace` when every variant up to the bound is taken.
    #[instrument(skip(self, checksum), fields(asset_id = %asset_id, candidate = %candidate))]
    pub fn reserve(
        &self,
        asset_id: AssetId,
        checksum: Checksum,
        candidate: &StoragePath,
    ) -> Result<StoragePath, ReserveError> {
        self.index.with_state(|state| {
            for attempt in 0..=self.max_suffix {
                let path = if attempt == 0 {
                    candidate.clone()
                } else {
                    candidate.with_suffix(attempt)
                };

                match state.occupant(&path) {
                    None => {
                        state.release_others(asset_id, &path);
                        state.reserve(path.clone(), Reservation::new(asset_id, checksum));
                        debug!(path = %path, attempt, "Reserved path");
                        return Ok(path);
                    }
                    Some((holder, _)) if holder == asset_id => {
                        state.release_others(asset_id, &path);
                        return Ok(path);
                    }
                    Some((holder, held)) if held == checksum => {
                        debug!(path = %path, existing = %holder, "Content duplicate");
                        return Err(ReserveError::new(ReserveErrorKind::DuplicateDetected {
                            existing: holder.as_uuid(),
                            path: path.to_string(),
                        }));
                    }
                    Some(_) => continue,
                }
            }

            warn!(max_suffix = self.max_suffix, "Suffix space exhausted");
            Err(ReserveError::new(ReserveErrorKind::ExhaustedSuffixSpace {
                path: candidate.to_string(),
                attempts: self.max_suffix,
            }))
        })
    }

    /// Drop a reservation made by [`reserve`](Self::reserve).
    pub fn release(&self, asset_id: AssetId, path: &StoragePath) {
        self.index.release(asset_id, path);
    }
}

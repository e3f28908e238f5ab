//! The storage location index.
//!
//! Maps every placed asset to its current path and content checksum. The
//! mapping is injective: a path is held by at most one asset, whether as a
//! committed entry or as an in-flight reservation. All mutations, including
//! reservation probing, run under one write lock, so a path can never be
//! seen as free by two reservations at once.
//!
//! Durable indexes write a snapshot after each mutation, outside the lock.
//! A path an asset is leaving stays held by it until that write lands, so a
//! failed write can always be rolled back.

use darkroom_core::{AssetId, Checksum, StoragePath};
use darkroom_error::{StorageError, StorageErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const INDEX_FORMAT_VERSION: u32 = 1;

/// Where an asset is stored and what its content was when placed there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Current location under the media root
    pub path: StoragePath,
    /// Checksum at the time of placement
    pub checksum: Checksum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    pub(crate) asset_id: AssetId,
    pub(crate) checksum: Checksum,
    /// Path being vacated, held until the index write completes
    pub(crate) vacating: bool,
}

impl Reservation {
    pub(crate) fn new(asset_id: AssetId, checksum: Checksum) -> Self {
        Self {
            asset_id,
            checksum,
            vacating: false,
        }
    }

    fn vacating(asset_id: AssetId, checksum: Checksum) -> Self {
        Self {
            asset_id,
            checksum,
            vacating: true,
        }
    }
}

/// Index contents. Only reachable through [`LocationIndex`]'s lock.
#[derive(Debug, Default)]
pub(crate) struct IndexState {
    entries: HashMap<AssetId, IndexEntry>,
    by_path: HashMap<StoragePath, AssetId>,
    reservations: HashMap<StoragePath, Reservation>,
    /// Bumped on every mutation of `entries`
    generation: u64,
}

impl IndexState {
    /// Who holds `path`, committed or reserved, and with what content.
    pub(crate) fn occupant(&self, path: &StoragePath) -> Option<(AssetId, Checksum)> {
        if let Some(id) = self.by_path.get(path) {
            let checksum = self.entries.get(id).map(|e| e.checksum)?;
            return Some((*id, checksum));
        }
        self.reservations
            .get(path)
            .map(|r| (r.asset_id, r.checksum))
    }

    pub(crate) fn reserve(&mut self, path: StoragePath, reservation: Reservation) {
        self.reservations.insert(path, reservation);
    }

    /// Drop reservations `asset_id` holds on anything but `keep`. Paths
    /// the asset is still vacating are kept.
    pub(crate) fn release_others(&mut self, asset_id: AssetId, keep: &StoragePath) {
        self.reservations
            .retain(|path, r| r.asset_id != asset_id || r.vacating || path == keep);
    }

    fn to_file(&self) -> IndexFile {
        let mut entries: Vec<PersistedEntry> = self
            .entries
            .iter()
            .map(|(id, e)| PersistedEntry {
                asset_id: *id,
                path: e.path.clone(),
                checksum: e.checksum,
            })
            .collect();
        entries.sort_by_key(|e| e.asset_id);
        IndexFile {
            version: INDEX_FORMAT_VERSION,
            entries,
        }
    }

    /// Drop the hold on a vacated path once it is no longer needed.
    fn release_vacated(&mut self, asset_id: AssetId, path: &StoragePath) {
        if self
            .reservations
            .get(path)
            .is_some_and(|r| r.asset_id == asset_id && r.vacating)
        {
            self.reservations.remove(path);
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    asset_id: AssetId,
    path: StoragePath,
    checksum: Checksum,
}

/// Authoritative `asset → path` mapping.
///
/// Reads take a shared lock; reservations and commits take the exclusive
/// lock. When opened from a file, every commit and removal is written
/// through to disk before the call returns, and rolled back in memory if
/// the write fails. Concurrent commits share a single write when they
/// arrive while one is in progress.
#[derive(Debug)]
pub struct LocationIndex {
    state: RwLock<IndexState>,
    file: Option<PathBuf>,
    /// Generation last written to `file`
    persisted: Mutex<u64>,
}

impl LocationIndex {
    /// Create an empty, non-durable index.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            file: None,
            persisted: Mutex::new(0),
        }
    }

    /// Open a durable index backed by a JSON file, loading it if present.
    ///
    /// # Errors
    ///
    /// Returns `Load` if the file cannot be read or parsed and
    /// `IndexCorruption` if two entries claim the same path.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let state = match std::fs::read(&path) {
            Ok(bytes) => Self::decode(&bytes, &path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No index file yet, starting empty");
                IndexState::default()
            }
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::Load(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
            }
        };

        info!(entries = state.entries.len(), "Opened storage location index");
        Ok(Self {
            state: RwLock::new(state),
            file: Some(path),
            persisted: Mutex::new(0),
        })
    }

    fn decode(bytes: &[u8], path: &Path) -> Result<IndexState, StorageError> {
        let file: IndexFile = serde_json::from_slice(bytes).map_err(|e| {
            StorageError::new(StorageErrorKind::Load(format!("{}: {}", path.display(), e)))
        })?;
        if file.version != INDEX_FORMAT_VERSION {
            return Err(StorageError::new(StorageErrorKind::Load(format!(
                "{}: unsupported index version {}",
                path.display(),
                file.version
            ))));
        }

        let mut state = IndexState::default();
        for entry in file.entries {
            if let Some(other) = state.by_path.insert(entry.path.clone(), entry.asset_id) {
                return Err(StorageError::new(StorageErrorKind::IndexCorruption(format!(
                    "{} is claimed by both {} and {}",
                    entry.path, other, entry.asset_id
                ))));
            }
            if state
                .entries
                .insert(
                    entry.asset_id,
                    IndexEntry {
                        path: entry.path,
                        checksum: entry.checksum,
                    },
                )
                .is_some()
            {
                return Err(StorageError::new(StorageErrorKind::IndexCorruption(format!(
                    "asset {} appears more than once",
                    entry.asset_id
                ))));
            }
        }
        Ok(state)
    }

    /// Current path of an asset.
    pub fn get(&self, asset_id: AssetId) -> Option<StoragePath> {
        self.entry(asset_id).map(|e| e.path)
    }

    /// Current entry of an asset.
    pub fn entry(&self, asset_id: AssetId) -> Option<IndexEntry> {
        self.read().entries.get(&asset_id).cloned()
    }

    /// Asset committed at `path`, ignoring reservations.
    pub fn owner_of(&self, path: &StoragePath) -> Option<AssetId> {
        self.read().by_path.get(path).copied()
    }

    /// Asset holding a reservation on `path`.
    pub fn reserved_by(&self, path: &StoragePath) -> Option<AssetId> {
        self.read().reservations.get(path).map(|r| r.asset_id)
    }

    /// Number of in-flight reservations.
    pub fn reservation_count(&self) -> usize {
        self.read().reservations.len()
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Whether no asset is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All committed entries, ordered by asset identity.
    pub fn snapshot(&self) -> Vec<(AssetId, IndexEntry)> {
        let mut entries: Vec<_> = self
            .read()
            .entries
            .iter()
            .map(|(id, e)| (*id, e.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    /// Record that `asset_id` now lives at `path` with `checksum`.
    ///
    /// Replaces any previous entry for the asset, frees its previous path and
    /// consumes its reservation of `path`.
    ///
    /// # Errors
    ///
    /// `IndexCorruption` if another asset holds `path`; `Persist` if the
    /// index file cannot be written, in which case the asset's entry is
    /// restored.
    #[instrument(skip(self), fields(asset_id = %asset_id, path = %path))]
    pub async fn commit(
        &self,
        asset_id: AssetId,
        path: StoragePath,
        checksum: Checksum,
    ) -> Result<(), StorageError> {
        let (previous, reservation, generation) = {
            let mut state = self.write();

            if let Some((holder, _)) = state.occupant(&path) {
                if holder != asset_id {
                    return Err(StorageError::new(StorageErrorKind::IndexCorruption(format!(
                        "{} is held by {}, cannot commit {}",
                        path, holder, asset_id
                    ))));
                }
            }

            let previous = state.entries.insert(
                asset_id,
                IndexEntry {
                    path: path.clone(),
                    checksum,
                },
            );
            let reservation = state.reservations.remove(&path);
            if let Some(old) = previous.as_ref().filter(|old| old.path != path) {
                state.by_path.remove(&old.path);
                state.reserve(old.path.clone(), Reservation::vacating(asset_id, old.checksum));
            }
            state.by_path.insert(path.clone(), asset_id);
            state.generation += 1;
            (previous, reservation, state.generation)
        };

        let written = self.persist(generation).await;

        let mut state = self.write();
        if let Some(old) = previous.as_ref().filter(|old| old.path != path) {
            state.release_vacated(asset_id, &old.path);
        }
        if let Err(e) = written {
            let still_ours = state
                .entries
                .get(&asset_id)
                .is_some_and(|e| e.path == path && e.checksum == checksum);
            if still_ours {
                state.by_path.remove(&path);
                match previous {
                    Some(old) => {
                        state.by_path.insert(old.path.clone(), asset_id);
                        state.entries.insert(asset_id, old);
                    }
                    None => {
                        state.entries.remove(&asset_id);
                    }
                }
                if let Some(r) = reservation {
                    state.reservations.entry(path).or_insert(r);
                }
                state.generation += 1;
            }
            return Err(e);
        }
        debug!("Committed index entry");
        Ok(())
    }

    /// Drop a reservation `asset_id` holds on `path`. A reservation held by
    /// another asset is left alone.
    #[instrument(skip(self), fields(asset_id = %asset_id, path = %path))]
    pub fn release(&self, asset_id: AssetId, path: &StoragePath) {
        let mut state = self.write();
        if state
            .reservations
            .get(path)
            .is_some_and(|r| r.asset_id == asset_id && !r.vacating)
        {
            state.reservations.remove(path);
            debug!("Released reservation");
        }
    }

    /// Forget an asset after it was deleted from the catalog. Also drops
    /// its reservations.
    ///
    /// # Errors
    ///
    /// `Persist` if the index file cannot be written, in which case the
    /// entry is restored.
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn remove(&self, asset_id: AssetId) -> Result<Option<IndexEntry>, StorageError> {
        let (removed, generation) = {
            let mut state = self.write();
            state
                .reservations
                .retain(|_, r| r.asset_id != asset_id || r.vacating);
            let removed = state.entries.remove(&asset_id);
            let Some(entry) = &removed else {
                return Ok(None);
            };
            state.by_path.remove(&entry.path);
            state.reserve(
                entry.path.clone(),
                Reservation::vacating(asset_id, entry.checksum),
            );
            state.generation += 1;
            (removed, state.generation)
        };

        let written = self.persist(generation).await;

        let mut state = self.write();
        if let Some(entry) = &removed {
            state.release_vacated(asset_id, &entry.path);
            if let Err(e) = written {
                if !state.entries.contains_key(&asset_id) {
                    state.by_path.insert(entry.path.clone(), asset_id);
                    state.entries.insert(asset_id, entry.clone());
                    state.generation += 1;
                }
                return Err(e);
            }
        }
        info!("Removed asset from index");
        Ok(removed)
    }

    /// Run `f` inside the exclusive critical section.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut IndexState) -> R) -> R {
        f(&mut self.write())
    }

    /// Write the index file if `generation` is not on disk yet.
    ///
    /// Writers queue on `persisted`; each snapshots the state when its turn
    /// comes, so one write covers every mutation made before it.
    async fn persist(&self, generation: u64) -> Result<(), StorageError> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let mut persisted = self.persisted.lock().await;
        if *persisted >= generation {
            return Ok(());
        }

        let (snapshot, current) = {
            let state = self.read();
            (state.to_file(), state.generation)
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StorageError::new(StorageErrorKind::Persist(e.to_string())))?;

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::Persist(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = file.with_extension("tmp");
        tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Persist(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        if let Err(e) = tokio::fs::rename(&temp_path, file).await {
            warn!(error = %e, "Index rename failed");
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::Persist(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                file.display(),
                e
            ))));
        }

        *persisted = current;
        debug!(generation = current, entries = snapshot.entries.len(), "Index written");
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LocationIndex {
    fn default() -> Self {
        Self::in_memory()
    }
}

//! The reconciliation driver.
//!
//! A run has two phases. Planning walks the assets in ascending id order,
//! resolving each target and reserving it in the index; this phase is
//! sequential so suffix assignment is deterministic. Execution then runs
//! the planned moves on a bounded pool. Every asset ends in exactly one
//! [`AssetOutcome`] and no failure aborts the run.
//!
//! A target can be held by an asset that is itself moving away in the same
//! run, which pushes the newcomer onto a suffixed path. Once the moves are
//! done, assets left off their unsuffixed candidate are planned again in id
//! order until nothing moves, so a second run finds nothing to do.

use crate::{AssetOutcome, AssetState, CancellationToken, ReconcileReport};
use darkroom_core::{AssetId, AssetRecord, Checksum, StoragePath};
use darkroom_error::{DarkroomResult, MoveError, MoveErrorKind, StorageError, StorageErrorKind};
use darkroom_storage::{
    CollisionResolver, DEFAULT_MAX_SUFFIX, LocationIndex, Mover, RetryPolicy, StorageBackend,
};
use darkroom_template::TemplateSnapshot;
use derive_getters::Getters;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Tuning for reconciliation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ReconcileSettings {
    /// Moves executed at once
    #[serde(default = "default_concurrency")]
    concurrency: usize,
    /// Suffixed variants probed before giving up on a path
    #[serde(default = "default_max_suffix")]
    max_suffix: u32,
}

fn default_concurrency() -> usize {
    4
}

fn default_max_suffix() -> u32 {
    DEFAULT_MAX_SUFFIX
}

impl ReconcileSettings {
    /// Create settings. A concurrency of zero is treated as one.
    pub fn new(concurrency: usize, max_suffix: u32) -> Self {
        Self {
            concurrency: concurrency.max(1),
            max_suffix,
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self::new(default_concurrency(), default_max_suffix())
    }
}

#[derive(Debug)]
struct PlannedMove {
    asset_id: AssetId,
    from: StoragePath,
    to: StoragePath,
    checksum: Checksum,
    on_success: AssetOutcome,
}

#[derive(Debug)]
enum Plan {
    Finished(AssetOutcome),
    Move(PlannedMove),
}

/// Bound on settling passes after the main moves.
const MAX_SETTLE_PASSES: usize = 8;

fn transition(asset_id: AssetId, state: AssetState) {
    debug!(asset_id = %asset_id, state = %state, "Asset state");
}

/// Brings stored files in line with a template snapshot.
#[derive(Debug, Clone)]
pub struct Reconciler {
    resolver: CollisionResolver,
    mover: Mover,
    settings: ReconcileSettings,
}

impl Reconciler {
    /// Create a driver over `index`, moving files through `backend`.
    pub fn new(
        index: Arc<LocationIndex>,
        backend: Arc<dyn StorageBackend>,
        settings: ReconcileSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            resolver: CollisionResolver::new(index.clone(), settings.max_suffix),
            mover: Mover::new(backend, index, retry),
            settings,
        }
    }

    /// The index this driver reserves in and commits to.
    pub fn index(&self) -> &Arc<LocationIndex> {
        self.resolver.index()
    }

    /// The collision resolver.
    pub fn resolver(&self) -> &CollisionResolver {
        &self.resolver
    }

    /// The run settings.
    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Reconcile `assets` against `snapshot`.
    ///
    /// Assets whose move has not started when `cancel` is set are reported
    /// as cancelled and their reservations released.
    #[instrument(skip_all, fields(version = snapshot.version(), assets = assets.len()))]
    pub async fn reconcile_all(
        &self,
        snapshot: &TemplateSnapshot,
        mut assets: Vec<AssetRecord>,
        cancel: &CancellationToken,
    ) -> ReconcileReport {
        assets.sort_by_key(|a| a.id);
        assets.dedup_by_key(|a| a.id);

        let mut outcomes = BTreeMap::new();
        let mut moves = Vec::new();
        for asset in &assets {
            transition(asset.id, AssetState::Pending);
            if cancel.is_cancelled() {
                outcomes.insert(asset.id, AssetOutcome::Cancelled);
                continue;
            }
            match self.plan(snapshot, asset).await {
                Plan::Finished(outcome) => {
                    outcomes.insert(asset.id, outcome);
                }
                Plan::Move(planned) => moves.push(planned),
            }
        }

        debug!(moves = moves.len(), "Planning complete");
        outcomes.extend(self.run_moves(moves, cancel).await);
        self.settle(snapshot, &assets, cancel, &mut outcomes).await;

        let mut report = ReconcileReport::new(*snapshot.version());
        for (asset_id, outcome) in outcomes {
            report.record(asset_id, outcome);
        }
        let report = report.finish();
        info!(
            total = report.total,
            moved = report.moved,
            skipped = report.skipped,
            failed = report.failed,
            cancelled = report.cancelled,
            "Reconciliation finished"
        );
        report
    }

    /// Reconcile a single asset against `snapshot`.
    #[instrument(skip_all, fields(asset_id = %asset.id, version = snapshot.version()))]
    pub async fn reconcile_one(
        &self,
        snapshot: &TemplateSnapshot,
        asset: &AssetRecord,
    ) -> AssetOutcome {
        transition(asset.id, AssetState::Pending);
        match self.plan(snapshot, asset).await {
            Plan::Finished(outcome) => outcome,
            Plan::Move(planned) => self.execute(planned, &CancellationToken::new()).await.1,
        }
    }

    async fn run_moves(
        &self,
        moves: Vec<PlannedMove>,
        cancel: &CancellationToken,
    ) -> Vec<(AssetId, AssetOutcome)> {
        stream::iter(moves)
            .map(|planned| self.execute(planned, cancel))
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await
    }

    /// Move assets that ended up away from their candidate path back onto
    /// it, or onto a lower suffix, now that this run's moves have freed
    /// paths.
    async fn settle(
        &self,
        snapshot: &TemplateSnapshot,
        assets: &[AssetRecord],
        cancel: &CancellationToken,
        outcomes: &mut BTreeMap<AssetId, AssetOutcome>,
    ) {
        for pass in 0..MAX_SETTLE_PASSES {
            let mut moves = Vec::new();
            for asset in assets {
                if cancel.is_cancelled() {
                    return;
                }
                let displaced = outcomes
                    .get(&asset.id)
                    .and_then(AssetOutcome::path)
                    .is_some_and(|path| *path != snapshot.resolve(asset));
                if !displaced {
                    continue;
                }
                // Anything but a move leaves the earlier outcome standing
                if let Plan::Move(planned) = self.plan(snapshot, asset).await {
                    moves.push(planned);
                }
            }
            if moves.is_empty() {
                return;
            }

            debug!(pass, moves = moves.len(), "Settling displaced assets");
            for (asset_id, outcome) in self.run_moves(moves, cancel).await {
                let merged = match (outcomes.remove(&asset_id), outcome) {
                    (Some(earlier), AssetOutcome::Cancelled) => earlier,
                    (Some(AssetOutcome::Moved { from, .. }), AssetOutcome::Moved { to, .. }) => {
                        AssetOutcome::Moved { from, to }
                    }
                    (Some(AssetOutcome::Placed { .. }), AssetOutcome::Moved { to, .. }) => {
                        AssetOutcome::Placed { to }
                    }
                    (_, outcome) => outcome,
                };
                outcomes.insert(asset_id, merged);
            }
        }
        warn!(passes = MAX_SETTLE_PASSES, "Stopped settling with assets still displaced");
    }

    async fn plan(&self, snapshot: &TemplateSnapshot, asset: &AssetRecord) -> Plan {
        match self.try_plan(snapshot, asset).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(asset_id = %asset.id, error = %e, "Could not plan asset");
                transition(asset.id, AssetState::Failed);
                Plan::Finished(AssetOutcome::failed(&e))
            }
        }
    }

    async fn try_plan(
        &self,
        snapshot: &TemplateSnapshot,
        asset: &AssetRecord,
    ) -> DarkroomResult<Plan> {
        let id = asset.id;
        transition(id, AssetState::Resolving);
        let candidate = snapshot.resolve(asset);

        let indexed = self.index().get(id);
        let source = indexed
            .clone()
            .unwrap_or_else(|| asset.original_path.clone());
        let source_present = self.exists(&source).await?;
        if indexed.is_some() && !source_present {
            warn!(asset_id = %id, path = %source, "Indexed file is missing on disk");
        }

        transition(id, AssetState::Reserving);
        let target = match self.resolver.reserve(id, asset.checksum, &candidate) {
            Ok(path) => path,
            Err(e) => match e.duplicate_of() {
                Some(existing) => {
                    info!(asset_id = %id, existing = %existing, "Content duplicate, not moving");
                    transition(id, AssetState::Skipped);
                    return Ok(Plan::Finished(AssetOutcome::Duplicate {
                        existing: existing.into(),
                    }));
                }
                None => return Err(e.into()),
            },
        };

        if !source_present {
            return match self.repair(asset, indexed.is_some(), &source, &target).await {
                Ok(plan) => Ok(plan),
                Err(e) => {
                    self.resolver.release(id, &target);
                    Err(e)
                }
            };
        }

        if target == source && indexed.is_some() {
            transition(id, AssetState::Skipped);
            return Ok(Plan::Finished(AssetOutcome::Unchanged { path: target }));
        }

        let on_success = match indexed {
            Some(_) => AssetOutcome::Moved {
                from: source.clone(),
                to: target.clone(),
            },
            None => AssetOutcome::Placed { to: target.clone() },
        };
        Ok(Plan::Move(PlannedMove {
            asset_id: id,
            from: source,
            to: target,
            checksum: asset.checksum,
            on_success,
        }))
    }

    /// Plan around a source file that is not on disk.
    ///
    /// Content already at the target is adopted; an indexed asset whose file
    /// vanished is re-placed from its original path.
    async fn repair(
        &self,
        asset: &AssetRecord,
        indexed: bool,
        source: &StoragePath,
        target: &StoragePath,
    ) -> DarkroomResult<Plan> {
        if self.exists(target).await? {
            let found = self
                .mover
                .backend()
                .checksum(target)
                .await
                .map_err(|e| MoveError::from_io(&e, target.as_str()))?;
            if found == asset.checksum {
                info!(asset_id = %asset.id, path = %target, "Asset content already at target, recording it");
                let on_success = if indexed {
                    AssetOutcome::Moved {
                        from: source.clone(),
                        to: target.clone(),
                    }
                } else {
                    AssetOutcome::Placed { to: target.clone() }
                };
                return Ok(Plan::Move(PlannedMove {
                    asset_id: asset.id,
                    from: target.clone(),
                    to: target.clone(),
                    checksum: asset.checksum,
                    on_success,
                }));
            }
        }

        if !indexed {
            return Err(MoveError::new(MoveErrorKind::SourceMissing(source.to_string())).into());
        }

        if asset.original_path != *source && self.exists(&asset.original_path).await? {
            warn!(
                asset_id = %asset.id,
                from = %asset.original_path,
                "Re-placing asset from its original path"
            );
            return Ok(Plan::Move(PlannedMove {
                asset_id: asset.id,
                from: asset.original_path.clone(),
                to: target.clone(),
                checksum: asset.checksum,
                on_success: AssetOutcome::Placed { to: target.clone() },
            }));
        }

        Err(StorageError::new(StorageErrorKind::IndexCorruption(format!(
            "{} is indexed at {} but no copy of it exists",
            asset.id, source
        )))
        .into())
    }

    async fn execute(
        &self,
        planned: PlannedMove,
        cancel: &CancellationToken,
    ) -> (AssetId, AssetOutcome) {
        let id = planned.asset_id;
        if cancel.is_cancelled() {
            self.resolver.release(id, &planned.to);
            debug!(asset_id = %id, "Cancelled before move");
            return (id, AssetOutcome::Cancelled);
        }

        transition(id, AssetState::Moving);
        match self
            .mover
            .move_asset(id, &planned.from, &planned.to, planned.checksum)
            .await
        {
            Ok(()) => {
                transition(id, AssetState::Done);
                (id, planned.on_success)
            }
            Err(e) => {
                transition(id, AssetState::Failed);
                (id, AssetOutcome::failed(&e))
            }
        }
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool, MoveError> {
        self.mover
            .backend()
            .exists(path)
            .await
            .map_err(|e| MoveError::from_io(&e, path.as_str()))
    }
}

//! The storage template service.

use crate::{
    AssetCatalog, AssetFilter, AssetOutcome, CancellationToken, FailureKind, ReconcileReport,
    ReconcileSettings, Reconciler,
};
use darkroom_core::{AssetId, AssetRecord, StoragePath};
use darkroom_error::{CatalogError, DarkroomResult};
use darkroom_storage::{DuplicateGroups, LocationIndex, RetryPolicy, StorageBackend};
use darkroom_template::{TemplateRegistry, TemplateSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Where an asset is and where the active template would put it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPath {
    /// The asset
    pub asset_id: AssetId,
    /// Indexed path, if the asset was placed
    pub current: Option<StoragePath>,
    /// Path the active template resolves to, before collision handling
    pub target: StoragePath,
}

impl PlannedPath {
    /// Whether the asset would change location.
    pub fn changes(&self) -> bool {
        self.current.as_ref() != Some(&self.target)
    }
}

/// Entry point for everything that places or locates asset files.
///
/// Wires the template registry, the location index, the reconciliation
/// driver and the asset catalog together. Media services only ever call
/// [`current_path`](Self::current_path).
#[derive(Debug, Clone)]
pub struct StorageTemplateService {
    catalog: Arc<dyn AssetCatalog>,
    registry: Arc<TemplateRegistry>,
    reconciler: Reconciler,
}

impl StorageTemplateService {
    /// Create a service.
    pub fn new(
        catalog: Arc<dyn AssetCatalog>,
        registry: Arc<TemplateRegistry>,
        index: Arc<LocationIndex>,
        backend: Arc<dyn StorageBackend>,
        settings: ReconcileSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            registry,
            reconciler: Reconciler::new(index, backend, settings, retry),
        }
    }

    /// The template registry.
    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    /// The location index.
    pub fn index(&self) -> &Arc<LocationIndex> {
        self.reconciler.index()
    }

    /// Resolve an asset's path under the active template and reserve it.
    ///
    /// The caller moves the file there itself, or gives the reservation
    /// back with [`release`](Self::release).
    ///
    /// # Errors
    ///
    /// A catalog error if the asset is unknown, or a reservation error for
    /// a content duplicate or an exhausted suffix space.
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn resolve_and_reserve(&self, asset_id: AssetId) -> DarkroomResult<StoragePath> {
        let asset = self.require(asset_id).await?;
        let candidate = self.registry.snapshot().resolve(&asset);
        let path = self
            .reconciler
            .resolver()
            .reserve(asset.id, asset.checksum, &candidate)?;
        Ok(path)
    }

    /// Reconcile every catalog asset against the active template.
    ///
    /// # Errors
    ///
    /// Returns error only if the catalog cannot be listed; per-asset
    /// failures are part of the report.
    pub async fn reconcile_all(&self) -> DarkroomResult<ReconcileReport> {
        self.reconcile_matching(&AssetFilter::all(), &CancellationToken::new())
            .await
    }

    /// Reconcile the assets matching `filter`, stopping early if `cancel`
    /// is set.
    ///
    /// # Errors
    ///
    /// Returns error only if the catalog cannot be listed.
    pub async fn reconcile_matching(
        &self,
        filter: &AssetFilter,
        cancel: &CancellationToken,
    ) -> DarkroomResult<ReconcileReport> {
        let snapshot = self.registry.snapshot();
        self.run(&snapshot, filter, cancel).await
    }

    /// Reconcile one asset against the active template.
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn reconcile_one(&self, asset_id: AssetId) -> AssetOutcome {
        let asset = match self.require(asset_id).await {
            Ok(asset) => asset,
            Err(e) => {
                return AssetOutcome::Failed {
                    kind: FailureKind::Catalog,
                    message: e.to_string(),
                };
            }
        };
        let snapshot = self.registry.snapshot();
        self.reconciler.reconcile_one(&snapshot, &asset).await
    }

    /// Where an asset is stored now.
    pub fn current_path(&self, asset_id: AssetId) -> Option<StoragePath> {
        self.index().get(asset_id)
    }

    /// Make `pattern` the active template and reconcile every asset against
    /// it. The report carries the new template version.
    ///
    /// # Errors
    ///
    /// A syntax error if the pattern does not compile, in which case the
    /// previous template stays active and nothing moves.
    #[instrument(skip(self))]
    pub async fn update_template(&self, pattern: &str) -> DarkroomResult<ReconcileReport> {
        let snapshot = self.registry.update(pattern)?;
        info!(version = snapshot.version(), "Template updated, reconciling");
        self.run(&snapshot, &AssetFilter::all(), &CancellationToken::new())
            .await
    }

    /// Forget an asset the catalog deleted. Returns the path it was
    /// stored at.
    ///
    /// # Errors
    ///
    /// Returns error if the index cannot be persisted.
    #[instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn asset_deleted(&self, asset_id: AssetId) -> DarkroomResult<Option<StoragePath>> {
        Ok(self.index().remove(asset_id).await?.map(|entry| entry.path))
    }

    /// Give back a reservation made by
    /// [`resolve_and_reserve`](Self::resolve_and_reserve).
    pub fn release(&self, asset_id: AssetId, path: &StoragePath) {
        self.reconciler.resolver().release(asset_id, path);
    }

    /// Current and target path of every asset matching `filter`, without
    /// reserving or moving anything.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be listed.
    pub async fn plan(&self, filter: &AssetFilter) -> DarkroomResult<Vec<PlannedPath>> {
        let snapshot = self.registry.snapshot();
        let mut assets = self.catalog.list_assets(filter).await?;
        assets.sort_by_key(|a| a.id);
        Ok(assets
            .iter()
            .map(|asset| PlannedPath {
                asset_id: asset.id,
                current: self.current_path(asset.id),
                target: snapshot.resolve(asset),
            })
            .collect())
    }

    /// Indexed assets that share content.
    pub fn duplicates(&self) -> DuplicateGroups {
        DuplicateGroups::from_index(self.index())
    }

    async fn run(
        &self,
        snapshot: &TemplateSnapshot,
        filter: &AssetFilter,
        cancel: &CancellationToken,
    ) -> DarkroomResult<ReconcileReport> {
        let assets = self.catalog.list_assets(filter).await?;
        Ok(self
            .reconciler
            .reconcile_all(snapshot, assets, cancel)
            .await)
    }

    async fn require(&self, asset_id: AssetId) -> DarkroomResult<AssetRecord> {
        match self.catalog.get_asset(asset_id).await? {
            Some(asset) => Ok(asset),
            None => Err(CatalogError::new(format!("asset {} not in catalog", asset_id)).into()),
        }
    }
}

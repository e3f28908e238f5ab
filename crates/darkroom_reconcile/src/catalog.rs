//! The asset catalog seam.
//!
//! The storage engine never owns asset records. It reads them through
//! [`AssetCatalog`], which the host application implements over its own
//! database.

use darkroom_core::{AssetId, AssetKind, AssetRecord};
use darkroom_error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, instrument};

/// Selects which assets a listing returns. The default selects all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFilter {
    /// Only assets owned by this user
    #[serde(default)]
    pub owner: Option<String>,
    /// Only assets of this kind
    #[serde(default)]
    pub kind: Option<AssetKind>,
    /// Only these assets
    #[serde(default)]
    pub ids: Option<Vec<AssetId>>,
}

impl AssetFilter {
    /// Select every asset.
    pub fn all() -> Self {
        Self::default()
    }

    /// Select the assets of one owner.
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    /// Whether `asset` passes the filter.
    pub fn matches(&self, asset: &AssetRecord) -> bool {
        if let Some(owner) = &self.owner {
            if asset.owner.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if asset.kind != kind {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&asset.id) {
                return false;
            }
        }
        true
    }
}

/// Read access to the asset records the engine places on disk.
#[async_trait::async_trait]
pub trait AssetCatalog: Send + Sync + std::fmt::Debug {
    /// List the assets matching `filter`, in any order.
    async fn list_assets(&self, filter: &AssetFilter) -> Result<Vec<AssetRecord>, CatalogError>;

    /// Fetch one asset, or `None` if the catalog does not know it.
    async fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>, CatalogError>;
}

/// A catalog held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    assets: RwLock<BTreeMap<AssetId, AssetRecord>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding `records`. Later records replace earlier
    /// ones with the same id.
    pub fn from_records(records: impl IntoIterator<Item = AssetRecord>) -> Self {
        let catalog = Self::new();
        for record in records {
            catalog.insert(record);
        }
        catalog
    }

    /// Add or replace an asset.
    pub fn insert(&self, asset: AssetRecord) {
        self.assets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(asset.id, asset);
    }

    /// Drop an asset.
    pub fn remove(&self, id: AssetId) -> Option<AssetRecord> {
        self.assets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl AssetCatalog for InMemoryCatalog {
    async fn list_assets(&self, filter: &AssetFilter) -> Result<Vec<AssetRecord>, CatalogError> {
        let assets = self.assets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(assets
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>, CatalogError> {
        let assets = self.assets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(assets.get(&id).cloned())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    assets: Vec<AssetRecord>,
}

/// A read-only catalog loaded from a JSON manifest of the form
/// `{"assets": [AssetRecord, ...]}`.
#[derive(Debug)]
pub struct ManifestCatalog {
    inner: InMemoryCatalog,
}

impl ManifestCatalog {
    /// Load a manifest file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a valid manifest.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CatalogError::new(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&bytes)
            .map_err(|e| CatalogError::new(format!("{}: {}", path.display(), e.message)))?;
        debug!(assets = catalog.inner.len(), "Loaded manifest");
        Ok(catalog)
    }

    /// Parse a manifest from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a valid manifest.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CatalogError> {
        let manifest: Manifest = serde_json::from_slice(bytes)
            .map_err(|e| CatalogError::new(format!("Invalid manifest: {}", e)))?;
        Ok(Self {
            inner: InMemoryCatalog::from_records(manifest.assets),
        })
    }

    /// Number of assets in the manifest.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the manifest lists no asset.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait::async_trait]
impl AssetCatalog for ManifestCatalog {
    async fn list_assets(&self, filter: &AssetFilter) -> Result<Vec<AssetRecord>, CatalogError> {
        self.inner.list_assets(filter).await
    }

    async fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>, CatalogError> {
        self.inner.get_asset(id).await
    }
}

//! Asset identity and metadata as supplied by the asset catalog.

use crate::{AssetKind, Checksum, StoragePath};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of an asset.
///
/// Ordering follows the UUID byte order, which gives reconciliation runs
/// a reproducible processing sequence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    /// Generate a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for AssetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Template-relevant metadata of an asset. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Local capture time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<NaiveDateTime>,
    /// Original filename without extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// File extension without the leading dot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Camera or phone manufacturer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    /// Camera or phone model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Albums containing the asset
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub albums: Vec<String>,
    /// Position within the asset's capture-time bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
}

impl AssetMetadata {
    /// Album used for path resolution: the lexically smallest name, so that
    /// album membership order never changes the resolved path.
    pub fn primary_album(&self) -> Option<&str> {
        self.albums
            .iter()
            .filter(|a| !a.trim().is_empty())
            .min()
            .map(String::as_str)
    }
}

/// An asset as the catalog reports it.
///
/// The storage engine reads these records; it never creates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct AssetRecord {
    /// Stable identity
    pub id: AssetId,
    /// Content fingerprint
    pub checksum: Checksum,
    /// Image or video
    pub kind: AssetKind,
    /// Where the file was first received, relative to the media root
    pub original_path: StoragePath,
    /// Owning user's name
    #[new(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Template variables
    #[new(default)]
    #[serde(default)]
    pub metadata: AssetMetadata,
}

impl AssetRecord {
    /// Set the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: AssetMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_album_is_order_independent() {
        let a = AssetMetadata {
            albums: vec!["Trip".to_string(), "Home".to_string()],
            ..Default::default()
        };
        let b = AssetMetadata {
            albums: vec!["Home".to_string(), "Trip".to_string()],
            ..Default::default()
        };
        assert_eq!(a.primary_album(), Some("Home"));
        assert_eq!(a.primary_album(), b.primary_album());
    }

    #[test]
    fn test_primary_album_ignores_blank_names() {
        let meta = AssetMetadata {
            albums: vec!["  ".to_string()],
            ..Default::default()
        };
        assert_eq!(meta.primary_album(), None);
    }
}

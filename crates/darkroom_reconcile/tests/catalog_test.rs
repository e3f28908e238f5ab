//! Tests for the catalog implementations.

use darkroom_core::{AssetId, AssetKind, AssetRecord, Checksum, StoragePath};
use darkroom_reconcile::{AssetCatalog, AssetFilter, InMemoryCatalog, ManifestCatalog};
use tempfile::TempDir;

fn record(owner: &str, kind: AssetKind) -> AssetRecord {
    AssetRecord::new(
        AssetId::new(),
        Checksum::of_bytes(owner.as_bytes()),
        kind,
        StoragePath::new("upload/file.bin").unwrap(),
    )
    .with_owner(owner)
}

#[tokio::test]
async fn test_filter_by_owner_kind_and_ids() {
    let alice = record("alice", AssetKind::Image);
    let bob = record("bob", AssetKind::Video);
    let catalog = InMemoryCatalog::from_records([alice.clone(), bob.clone()]);

    let all = catalog.list_assets(&AssetFilter::all()).await.unwrap();
    assert_eq!(all.len(), 2);

    let owned = catalog.list_assets(&AssetFilter::owned_by("alice")).await.unwrap();
    assert_eq!(owned, vec![alice.clone()]);

    let videos = AssetFilter {
        kind: Some(AssetKind::Video),
        ..AssetFilter::default()
    };
    assert_eq!(catalog.list_assets(&videos).await.unwrap(), vec![bob.clone()]);

    let by_id = AssetFilter {
        ids: Some(vec![bob.id]),
        ..AssetFilter::default()
    };
    assert_eq!(catalog.list_assets(&by_id).await.unwrap(), vec![bob]);
}

#[tokio::test]
async fn test_in_memory_get_and_remove() {
    let catalog = InMemoryCatalog::new();
    let asset = record("alice", AssetKind::Image);
    catalog.insert(asset.clone());

    assert_eq!(catalog.get_asset(asset.id).await.unwrap(), Some(asset.clone()));
    assert_eq!(catalog.remove(asset.id), Some(asset.clone()));
    assert_eq!(catalog.get_asset(asset.id).await.unwrap(), None);
    assert!(catalog.is_empty());
}

#[tokio::test]
async fn test_manifest_roundtrip_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = temp_dir.path().join("assets.json");
    let assets = vec![record("alice", AssetKind::Image), record("bob", AssetKind::Video)];
    let json = serde_json::json!({ "assets": assets });
    std::fs::write(&manifest, serde_json::to_vec(&json).unwrap()).unwrap();

    let catalog = ManifestCatalog::open(&manifest).await.unwrap();

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.get_asset(assets[1].id).await.unwrap(), Some(assets[1].clone()));
}

#[tokio::test]
async fn test_manifest_minimal_record() {
    let id = AssetId::new();
    let json = format!(
        r#"{{"assets":[{{"id":"{}","checksum":"{}","kind":"video","original_path":"in/clip.mov"}}]}}"#,
        id,
        Checksum::of_bytes(b"clip")
    );
    let catalog = ManifestCatalog::from_json(json.as_bytes()).unwrap();
    let asset = catalog.get_asset(id).await.unwrap().unwrap();
    assert_eq!(asset.kind, AssetKind::Video);
    assert_eq!(asset.owner, None);
    assert!(asset.metadata.albums.is_empty());
}

#[tokio::test]
async fn test_manifest_errors() {
    assert!(ManifestCatalog::from_json(b"[]").is_err());
    assert!(ManifestCatalog::open("/definitely/not/here.json").await.is_err());
}

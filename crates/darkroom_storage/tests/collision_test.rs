//! Tests for collision resolution.

use darkroom_core::{AssetId, Checksum, StoragePath};
use darkroom_error::ReserveErrorKind;
use darkroom_storage::{CollisionResolver, DEFAULT_MAX_SUFFIX, LocationIndex};
use std::collections::HashSet;
use std::sync::Arc;

fn path(s: &str) -> StoragePath {
    StoragePath::new(s).unwrap()
}

fn resolver() -> CollisionResolver {
    CollisionResolver::new(Arc::new(LocationIndex::in_memory()), DEFAULT_MAX_SUFFIX)
}

#[test]
fn test_free_path_is_returned_unchanged() {
    let resolver = resolver();
    let id = AssetId::new();
    let got = resolver
        .reserve(id, Checksum::of_bytes(b"a"), &path("2024/Trip/IMG_0001.jpg"))
        .unwrap();
    assert_eq!(got, path("2024/Trip/IMG_0001.jpg"));
    assert_eq!(resolver.index().reserved_by(&got), Some(id));
}

#[tokio::test]
async fn test_different_content_gets_suffix() {
    let resolver = resolver();
    let candidate = path("2024/Trip/IMG_0001.jpg");
    let (a, b, c) = (AssetId::new(), AssetId::new(), AssetId::new());

    resolver.index().commit(a, candidate.clone(), Checksum::of_bytes(b"a")).await.unwrap();
    let second = resolver.reserve(b, Checksum::of_bytes(b"b"), &candidate).unwrap();
    let third = resolver.reserve(c, Checksum::of_bytes(b"c"), &candidate).unwrap();

    assert_eq!(second, path("2024/Trip/IMG_0001_1.jpg"));
    assert_eq!(third, path("2024/Trip/IMG_0001_2.jpg"));
}

#[tokio::test]
async fn test_same_content_is_duplicate() {
    let resolver = resolver();
    let candidate = path("2024/Trip/IMG_0001.jpg");
    let sum = Checksum::of_bytes(b"identical");
    let (a, b) = (AssetId::new(), AssetId::new());

    resolver.index().commit(a, candidate.clone(), sum).await.unwrap();
    let err = resolver.reserve(b, sum, &candidate).unwrap_err();

    assert_eq!(
        err.kind,
        ReserveErrorKind::DuplicateDetected {
            existing: a.as_uuid(),
            path: candidate.to_string(),
        }
    );
    assert_eq!(resolver.index().reservation_count(), 0);
}

#[test]
fn test_duplicate_against_pending_reservation() {
    let resolver = resolver();
    let candidate = path("x.jpg");
    let sum = Checksum::of_bytes(b"same");
    let (a, b) = (AssetId::new(), AssetId::new());

    resolver.reserve(a, sum, &candidate).unwrap();
    let err = resolver.reserve(b, sum, &candidate).unwrap_err();
    assert_eq!(err.duplicate_of(), Some(a.as_uuid()));
}

#[tokio::test]
async fn test_same_asset_is_idempotent() {
    let resolver = resolver();
    let candidate = path("x.jpg");
    let id = AssetId::new();
    let sum = Checksum::of_bytes(b"a");

    let first = resolver.reserve(id, sum, &candidate).unwrap();
    let again = resolver.reserve(id, sum, &candidate).unwrap();
    assert_eq!(first, again);
    assert_eq!(resolver.index().reservation_count(), 1);

    // Committed path owned by the asset is also returned unchanged
    resolver.index().commit(id, first.clone(), sum).await.unwrap();
    assert_eq!(resolver.reserve(id, sum, &candidate).unwrap(), first);
    assert_eq!(resolver.index().reservation_count(), 0);
}

#[tokio::test]
async fn test_asset_already_on_suffixed_path_keeps_it() {
    let resolver = resolver();
    let candidate = path("x.jpg");
    let (a, b) = (AssetId::new(), AssetId::new());
    resolver.index().commit(a, candidate.clone(), Checksum::of_bytes(b"a")).await.unwrap();
    resolver.index().commit(b, path("x_1.jpg"), Checksum::of_bytes(b"b")).await.unwrap();

    let got = resolver.reserve(b, Checksum::of_bytes(b"b"), &candidate).unwrap();
    assert_eq!(got, path("x_1.jpg"));
}

#[test]
fn test_new_reservation_replaces_old_one() {
    let resolver = resolver();
    let id = AssetId::new();
    let sum = Checksum::of_bytes(b"a");
    resolver.reserve(id, sum, &path("one.jpg")).unwrap();
    resolver.reserve(id, sum, &path("two.jpg")).unwrap();

    assert_eq!(resolver.index().reserved_by(&path("one.jpg")), None);
    assert_eq!(resolver.index().reserved_by(&path("two.jpg")), Some(id));
}

#[test]
fn test_release_only_affects_own_reservation() {
    let resolver = resolver();
    let (a, b) = (AssetId::new(), AssetId::new());
    let p = resolver.reserve(a, Checksum::of_bytes(b"a"), &path("x.jpg")).unwrap();

    resolver.release(b, &p);
    assert_eq!(resolver.index().reserved_by(&p), Some(a));

    resolver.release(a, &p);
    assert_eq!(resolver.index().reserved_by(&p), None);
}

#[tokio::test]
async fn test_exhausted_suffix_space() {
    let index = Arc::new(LocationIndex::in_memory());
    let resolver = CollisionResolver::new(index.clone(), 3);
    let candidate = path("busy.jpg");

    for n in 0..=3u32 {
        let p = if n == 0 { candidate.clone() } else { candidate.with_suffix(n) };
        index
            .commit(AssetId::new(), p, Checksum::of_bytes(&n.to_le_bytes()))
            .await
            .unwrap();
    }

    let err = resolver
        .reserve(AssetId::new(), Checksum::of_bytes(b"new"), &candidate)
        .unwrap_err();
    assert_eq!(
        err.kind,
        ReserveErrorKind::ExhaustedSuffixSpace {
            path: "busy.jpg".to_string(),
            attempts: 3,
        }
    );
}

async fn resolver_with_held_path() -> CollisionResolver {
    let resolver = resolver();
    resolver
        .index()
        .commit(AssetId::new(), path("x.jpg"), Checksum::of_bytes(b"held"))
        .await
        .unwrap();
    resolver
}

#[tokio::test]
async fn test_deterministic_for_fixed_state() {
    let id = AssetId::new();
    let first = resolver_with_held_path()
        .await
        .reserve(id, Checksum::of_bytes(b"mine"), &path("x.jpg"))
        .unwrap();
    let second = resolver_with_held_path()
        .await
        .reserve(id, Checksum::of_bytes(b"mine"), &path("x.jpg"))
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_reservations_never_share_a_path() {
    let resolver = Arc::new(resolver());
    let candidate = path("2024/contested.jpg");

    let handles: Vec<_> = (0..16u32)
        .map(|n| {
            let resolver = resolver.clone();
            let candidate = candidate.clone();
            std::thread::spawn(move || {
                resolver
                    .reserve(AssetId::new(), Checksum::of_bytes(&n.to_le_bytes()), &candidate)
                    .unwrap()
            })
        })
        .collect();

    let paths: HashSet<StoragePath> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(paths.len(), 16);
    assert!(paths.contains(&candidate));
}

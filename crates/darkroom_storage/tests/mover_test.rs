//! Tests for the asset mover.

use darkroom_core::{AssetId, Checksum, StoragePath};
use darkroom_error::{DarkroomErrorKind, MoveErrorKind};
use darkroom_storage::{
    CollisionResolver, LocalFilesystem, LocationIndex, Mover, RetryPolicy, StorageBackend,
};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn path(s: &str) -> StoragePath {
    StoragePath::new(s).unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(1, 5, 3)
}

/// Local filesystem whose renames fail with scripted errors first.
#[derive(Debug)]
struct ScriptedBackend {
    inner: LocalFilesystem,
    rename_failures: Mutex<VecDeque<io::ErrorKind>>,
    renames: Mutex<usize>,
    /// Reported as absent even when present on disk
    hidden: Option<StoragePath>,
}

impl ScriptedBackend {
    fn new(inner: LocalFilesystem, failures: impl IntoIterator<Item = io::ErrorKind>) -> Self {
        Self {
            inner,
            rename_failures: Mutex::new(failures.into_iter().collect()),
            renames: Mutex::new(0),
            hidden: None,
        }
    }

    /// Report `path` as absent, as if it appeared after the check.
    fn hiding(mut self, path: StoragePath) -> Self {
        self.hidden = Some(path);
        self
    }

    fn rename_attempts(&self) -> usize {
        *self.renames.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl StorageBackend for ScriptedBackend {
    async fn exists(&self, path: &StoragePath) -> io::Result<bool> {
        if self.hidden.as_ref() == Some(path) {
            return Ok(false);
        }
        self.inner.exists(path).await
    }

    async fn rename(&self, from: &StoragePath, to: &StoragePath) -> io::Result<()> {
        *self.renames.lock().unwrap() += 1;
        let scripted = self.rename_failures.lock().unwrap().pop_front();
        match scripted {
            Some(kind) => Err(io::Error::new(kind, "scripted failure")),
            None => self.inner.rename(from, to).await,
        }
    }

    async fn copy(&self, from: &StoragePath, to: &StoragePath) -> io::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn remove_file(&self, path: &StoragePath) -> io::Result<()> {
        self.inner.remove_file(path).await
    }

    async fn create_parent_dirs(&self, path: &StoragePath) -> io::Result<()> {
        self.inner.create_parent_dirs(path).await
    }

    async fn checksum(&self, path: &StoragePath) -> io::Result<Checksum> {
        self.inner.checksum(path).await
    }

    async fn prune_empty_parents(&self, path: &StoragePath) -> io::Result<()> {
        self.inner.prune_empty_parents(path).await
    }
}

struct Fixture {
    _temp_dir: TempDir,
    fs: LocalFilesystem,
    index: Arc<LocationIndex>,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFilesystem::new(temp_dir.path().join("library")).unwrap();
        Self {
            _temp_dir: temp_dir,
            fs,
            index: Arc::new(LocationIndex::in_memory()),
        }
    }

    fn write(&self, p: &StoragePath, bytes: &[u8]) -> Checksum {
        let absolute = self.fs.absolute(p);
        std::fs::create_dir_all(absolute.parent().unwrap()).unwrap();
        std::fs::write(absolute, bytes).unwrap();
        Checksum::of_bytes(bytes)
    }

    fn reserve(&self, id: AssetId, sum: Checksum, candidate: &StoragePath) -> StoragePath {
        CollisionResolver::new(self.index.clone(), 10)
            .reserve(id, sum, candidate)
            .unwrap()
    }

    fn mover(&self, backend: Arc<dyn StorageBackend>) -> Mover {
        Mover::new(backend, self.index.clone(), fast_retry())
    }
}

fn move_kind(err: darkroom_error::DarkroomError) -> MoveErrorKind {
    match err.into_kind() {
        DarkroomErrorKind::Move(e) => e.kind,
        other => panic!("expected move error, got {}", other),
    }
}

#[tokio::test]
async fn test_move_relocates_file_and_commits() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("upload/a.jpg");
    let sum = fx.write(&from, b"pixels");
    fx.index.commit(id, from.clone(), sum).await.unwrap();

    let to = fx.reserve(id, sum, &path("2024/Trip/a.jpg"));
    let mover = fx.mover(Arc::new(fx.fs.clone()));
    mover.move_asset(id, &from, &to, sum).await.unwrap();

    assert_eq!(fx.index.get(id), Some(to.clone()));
    assert_eq!(fx.index.reservation_count(), 0);
    assert!(fx.fs.absolute(&to).exists());
    assert!(!fx.fs.absolute(&from).exists());
    // The emptied upload directory is pruned, the media root stays
    assert!(!fx.fs.root().join("upload").exists());
    assert!(fx.fs.root().exists());
}

#[tokio::test]
async fn test_move_in_place_only_commits() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let here = path("2024/a.jpg");
    let sum = fx.write(&here, b"pixels");
    let reserved = fx.reserve(id, sum, &here);

    fx.mover(Arc::new(fx.fs.clone()))
        .move_asset(id, &here, &reserved, sum)
        .await
        .unwrap();
    assert_eq!(fx.index.get(id), Some(here.clone()));
    assert!(fx.fs.absolute(&here).exists());
}

#[tokio::test]
async fn test_untracked_file_at_target_is_not_clobbered() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("a.jpg");
    let sum = fx.write(&from, b"mine");
    fx.index.commit(id, from.clone(), sum).await.unwrap();
    let to = fx.reserve(id, sum, &path("2024/a.jpg"));
    fx.write(&to, b"stranger");

    let err = fx
        .mover(Arc::new(fx.fs.clone()))
        .move_asset(id, &from, &to, sum)
        .await
        .unwrap_err();

    assert!(matches!(move_kind(err), MoveErrorKind::TargetOccupied(_)));
    assert_eq!(fx.index.get(id), Some(from.clone()));
    assert_eq!(fx.index.reserved_by(&to), None);
    assert_eq!(std::fs::read(fx.fs.absolute(&to)).unwrap(), b"stranger");
}

#[tokio::test]
async fn test_missing_source_fails_without_retry() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let sum = Checksum::of_bytes(b"gone");
    let to = fx.reserve(id, sum, &path("2024/a.jpg"));
    let backend = Arc::new(ScriptedBackend::new(fx.fs.clone(), []));

    let err = fx
        .mover(backend.clone())
        .move_asset(id, &path("nowhere.jpg"), &to, sum)
        .await
        .unwrap_err();

    assert!(matches!(move_kind(err), MoveErrorKind::SourceMissing(_)));
    assert_eq!(backend.rename_attempts(), 0);
    assert_eq!(fx.index.reservation_count(), 0);
}

#[tokio::test]
async fn test_failed_move_leaves_index_unchanged() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("a.jpg");
    let sum = fx.write(&from, b"pixels");
    fx.index.commit(id, from.clone(), sum).await.unwrap();
    let to = fx.reserve(id, sum, &path("2024/a.jpg"));
    let backend = Arc::new(ScriptedBackend::new(
        fx.fs.clone(),
        [io::ErrorKind::PermissionDenied],
    ));

    let err = fx
        .mover(backend.clone())
        .move_asset(id, &from, &to, sum)
        .await
        .unwrap_err();

    assert!(matches!(move_kind(err), MoveErrorKind::PermissionDenied(_)));
    assert_eq!(backend.rename_attempts(), 1);
    assert_eq!(fx.index.get(id), Some(from.clone()));
    assert_eq!(fx.index.reserved_by(&to), None);
    assert!(fx.fs.absolute(&from).exists());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("a.jpg");
    let sum = fx.write(&from, b"pixels");
    let to = fx.reserve(id, sum, &path("2024/a.jpg"));
    let backend = Arc::new(ScriptedBackend::new(
        fx.fs.clone(),
        [io::ErrorKind::Interrupted, io::ErrorKind::TimedOut],
    ));

    fx.mover(backend.clone())
        .move_asset(id, &from, &to, sum)
        .await
        .unwrap();

    assert_eq!(backend.rename_attempts(), 3);
    assert_eq!(fx.index.get(id), Some(to));
}

#[tokio::test]
async fn test_transient_failures_give_up_after_retries() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("a.jpg");
    let sum = fx.write(&from, b"pixels");
    let to = fx.reserve(id, sum, &path("2024/a.jpg"));
    let backend = Arc::new(ScriptedBackend::new(
        fx.fs.clone(),
        [io::ErrorKind::Interrupted; 10],
    ));

    let err = fx
        .mover(backend.clone())
        .move_asset(id, &from, &to, sum)
        .await
        .unwrap_err();

    assert!(matches!(move_kind(err), MoveErrorKind::Transient(_)));
    assert_eq!(backend.rename_attempts(), 4);
    assert_eq!(fx.index.get(id), None);
    assert_eq!(fx.index.reservation_count(), 0);
}

#[tokio::test]
async fn test_cross_device_move_copies_and_verifies() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("a.jpg");
    let sum = fx.write(&from, b"pixels");
    let to = fx.reserve(id, sum, &path("2024/a.jpg"));
    let backend = Arc::new(ScriptedBackend::new(
        fx.fs.clone(),
        [io::ErrorKind::CrossesDevices],
    ));

    fx.mover(backend).move_asset(id, &from, &to, sum).await.unwrap();

    assert_eq!(std::fs::read(fx.fs.absolute(&to)).unwrap(), b"pixels");
    assert!(!fx.fs.absolute(&from).exists());
    assert_eq!(fx.index.get(id), Some(to));
}

#[tokio::test]
async fn test_cross_device_checksum_mismatch_cleans_up() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("a.jpg");
    fx.write(&from, b"edited since import");
    let recorded = Checksum::of_bytes(b"original");
    let to = fx.reserve(id, recorded, &path("2024/a.jpg"));
    let backend = Arc::new(ScriptedBackend::new(
        fx.fs.clone(),
        [io::ErrorKind::CrossesDevices],
    ));

    let err = fx
        .mover(backend)
        .move_asset(id, &from, &to, recorded)
        .await
        .unwrap_err();

    assert!(matches!(move_kind(err), MoveErrorKind::ChecksumMismatch(_)));
    assert!(fx.fs.absolute(&from).exists());
    assert!(!fx.fs.absolute(&to).exists());
    assert_eq!(fx.index.get(id), None);
}

#[tokio::test]
async fn test_file_appearing_at_target_after_check_is_not_replaced() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("a.jpg");
    let sum = fx.write(&from, b"mine");
    fx.index.commit(id, from.clone(), sum).await.unwrap();
    let to = fx.reserve(id, sum, &path("2024/a.jpg"));
    fx.write(&to, b"stranger");
    let backend = Arc::new(ScriptedBackend::new(fx.fs.clone(), []).hiding(to.clone()));

    let err = fx
        .mover(backend.clone())
        .move_asset(id, &from, &to, sum)
        .await
        .unwrap_err();

    assert!(matches!(move_kind(err), MoveErrorKind::TargetOccupied(_)));
    assert_eq!(backend.rename_attempts(), 1);
    assert_eq!(std::fs::read(fx.fs.absolute(&to)).unwrap(), b"stranger");
    assert_eq!(std::fs::read(fx.fs.absolute(&from)).unwrap(), b"mine");
    assert_eq!(fx.index.get(id), Some(from));
    assert_eq!(fx.index.reservation_count(), 0);
}

#[tokio::test]
async fn test_cross_device_copy_does_not_replace_or_delete_stranger() {
    let fx = Fixture::new();
    let id = AssetId::new();
    let from = path("a.jpg");
    let sum = fx.write(&from, b"mine");
    let to = fx.reserve(id, sum, &path("2024/a.jpg"));
    fx.write(&to, b"stranger");
    let backend = Arc::new(
        ScriptedBackend::new(fx.fs.clone(), [io::ErrorKind::CrossesDevices]).hiding(to.clone()),
    );

    let err = fx
        .mover(backend)
        .move_asset(id, &from, &to, sum)
        .await
        .unwrap_err();

    assert!(matches!(move_kind(err), MoveErrorKind::TargetOccupied(_)));
    assert_eq!(std::fs::read(fx.fs.absolute(&to)).unwrap(), b"stranger");
    assert!(fx.fs.absolute(&from).exists());
}

#[tokio::test]
async fn test_local_rename_refuses_existing_target() {
    let fx = Fixture::new();
    let (from, to) = (path("a.jpg"), path("b.jpg"));
    fx.write(&from, b"a");
    fx.write(&to, b"b");

    let err = fx.fs.rename(&from, &to).await.unwrap_err();

    assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    assert_eq!(std::fs::read(fx.fs.absolute(&from)).unwrap(), b"a");
    assert_eq!(std::fs::read(fx.fs.absolute(&to)).unwrap(), b"b");
}

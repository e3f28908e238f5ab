//! Filesystem access for the mover.

use darkroom_core::{Checksum, StoragePath};
use darkroom_error::{StorageError, StorageErrorKind};
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem operations the mover needs, addressed by [`StoragePath`].
///
/// Implementations resolve paths against their own media root. Errors are
/// raw I/O errors; the mover classifies them.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Whether a file exists at `path`.
    async fn exists(&self, path: &StoragePath) -> io::Result<bool>;

    /// Rename `from` to `to`. Fails with `CrossesDevices` when the paths are
    /// on different filesystems and with `AlreadyExists` rather than
    /// replacing a file at `to`.
    async fn rename(&self, from: &StoragePath, to: &StoragePath) -> io::Result<()>;

    /// Copy the bytes of `from` to a new file `to`. Fails with
    /// `AlreadyExists` if `to` exists.
    async fn copy(&self, from: &StoragePath, to: &StoragePath) -> io::Result<()>;

    /// Delete the file at `path`.
    async fn remove_file(&self, path: &StoragePath) -> io::Result<()>;

    /// Create every missing directory above `path`.
    async fn create_parent_dirs(&self, path: &StoragePath) -> io::Result<()>;

    /// Compute the checksum of the file at `path`.
    async fn checksum(&self, path: &StoragePath) -> io::Result<Checksum>;

    /// Remove directories above `path` that are now empty, stopping at the
    /// first non-empty one or the media root.
    async fn prune_empty_parents(&self, path: &StoragePath) -> io::Result<()>;
}

/// Local filesystem backend rooted at the media library directory.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    /// Create a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(root))]
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();

        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::new(StorageErrorKind::Io(format!("{}: {}", root.display(), e)))
        })?;

        tracing::info!(path = %root.display(), "Opened media root");
        Ok(Self { root })
    }

    /// The media root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a storage path.
    pub fn absolute(&self, path: &StoragePath) -> PathBuf {
        path.under(&self.root)
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalFilesystem {
    async fn exists(&self, path: &StoragePath) -> io::Result<bool> {
        tokio::fs::try_exists(self.absolute(path)).await
    }

    async fn rename(&self, from: &StoragePath, to: &StoragePath) -> io::Result<()> {
        let (from, to) = (self.absolute(from), self.absolute(to));
        // Linking fails on an existing target where rename would replace it
        match tokio::fs::hard_link(&from, &to).await {
            Ok(()) => {
                if let Err(e) = tokio::fs::remove_file(&from).await {
                    let _ = tokio::fs::remove_file(&to).await;
                    return Err(e);
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                tracing::debug!("Hard links unsupported, falling back to checked rename");
                if tokio::fs::try_exists(&to).await? {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists", to.display()),
                    ));
                }
                tokio::fs::rename(&from, &to).await
            }
            Err(e) => Err(e),
        }
    }

    async fn copy(&self, from: &StoragePath, to: &StoragePath) -> io::Result<()> {
        let mut source = tokio::fs::File::open(self.absolute(from)).await?;
        let mut target = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.absolute(to))
            .await?;
        tokio::io::copy(&mut source, &mut target).await?;
        target.sync_all().await
    }

    async fn remove_file(&self, path: &StoragePath) -> io::Result<()> {
        tokio::fs::remove_file(self.absolute(path)).await
    }

    async fn create_parent_dirs(&self, path: &StoragePath) -> io::Result<()> {
        match self.absolute(path).parent() {
            Some(parent) => tokio::fs::create_dir_all(parent).await,
            None => Ok(()),
        }
    }

    async fn checksum(&self, path: &StoragePath) -> io::Result<Checksum> {
        Checksum::of_file(self.absolute(path)).await
    }

    async fn prune_empty_parents(&self, path: &StoragePath) -> io::Result<()> {
        let mut dir = path.parent();
        while let Some(relative) = dir {
            let absolute = relative
                .split('/')
                .fold(self.root.clone(), |acc, s| acc.join(s));
            let mut entries = match tokio::fs::read_dir(&absolute).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    dir = relative.rfind('/').map(|i| &relative[..i]);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if entries.next_entry().await?.is_some() {
                break;
            }
            tokio::fs::remove_dir(&absolute).await?;
            tracing::debug!(dir = %absolute.display(), "Removed empty directory");
            dir = relative.rfind('/').map(|i| &relative[..i]);
        }
        Ok(())
    }
}

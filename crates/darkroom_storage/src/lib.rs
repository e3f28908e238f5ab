//! Storage location management for Darkroom.
//!
//! This crate owns the answer to "where is this asset on disk":
//!
//! - [`LocationIndex`]: authoritative, durable `asset → path` mapping with
//!   in-flight reservations, guarded by a single critical section
//! - [`CollisionResolver`]: turns a candidate path into a unique one, or
//!   reports a content duplicate
//! - [`Mover`]: performs the filesystem move and commits the index only on
//!   success
//! - [`StorageBackend`]: the filesystem seam, with [`LocalFilesystem`] as the
//!   production implementation
//!
//! # Example
//!
//! ```rust
//! use darkroom_core::{AssetId, Checksum, StoragePath};
//! use darkroom_storage::{CollisionResolver, LocationIndex};
//! use std::sync::Arc;
//!
//! let index = Arc::new(LocationIndex::in_memory());
//! let resolver = CollisionResolver::new(index.clone(), 10_000);
//!
//! let candidate = StoragePath::new("2024/Trip/IMG_0001.jpg").unwrap();
//! let (a, b) = (AssetId::new(), AssetId::new());
//!
//! let first = resolver.reserve(a, Checksum::of_bytes(b"a"), &candidate).unwrap();
//! let second = resolver.reserve(b, Checksum::of_bytes(b"b"), &candidate).unwrap();
//! assert_eq!(first.as_str(), "2024/Trip/IMG_0001.jpg");
//! assert_eq!(second.as_str(), "2024/Trip/IMG_0001_1.jpg");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod collision;
mod duplicates;
mod index;
mod mover;

pub use backend::{LocalFilesystem, StorageBackend};
pub use collision::{CollisionResolver, DEFAULT_MAX_SUFFIX};
pub use duplicates::DuplicateGroups;
pub use index::{IndexEntry, LocationIndex};
pub use mover::{Mover, RetryPolicy};

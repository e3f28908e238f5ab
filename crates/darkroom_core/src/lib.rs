//! Core types for the Darkroom storage engine.
//!
//! This crate defines the vocabulary shared by every other Darkroom crate:
//!
//! - [`AssetRecord`] and [`AssetMetadata`]: what the asset catalog tells us about a file
//! - [`StoragePath`]: a validated, relative, `/`-separated location under the media root
//! - [`Checksum`]: SHA-256 content identity used to tell duplicates from name collisions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod asset;
mod asset_kind;
mod checksum;
mod path;

pub use asset::{AssetId, AssetMetadata, AssetRecord};
pub use asset_kind::AssetKind;
pub use checksum::Checksum;
pub use path::StoragePath;

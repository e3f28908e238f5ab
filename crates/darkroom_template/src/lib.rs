//! Storage path templates for Darkroom.
//!
//! A template such as `{{y}}/{{album}}/{{filename}}.{{ext}}` is compiled once
//! into a [`CompiledTemplate`] and then resolved against any number of assets.
//! Resolution is pure and total: missing metadata falls back to defaults and
//! unsafe characters are replaced, so every asset gets a usable path.
//!
//! # Example
//!
//! ```rust
//! use darkroom_core::{AssetId, AssetKind, AssetMetadata, AssetRecord, Checksum, StoragePath};
//! use darkroom_template::{CompiledTemplate, ResolveDefaults, resolve};
//!
//! let template = CompiledTemplate::compile("{{y}}/{{album}}/{{filename}}.{{ext}}").unwrap();
//! let asset = AssetRecord::new(
//!     AssetId::new(),
//!     Checksum::of_bytes(b"pixels"),
//!     AssetKind::Image,
//!     StoragePath::new("upload/IMG_0001.jpg").unwrap(),
//! )
//! .with_metadata(AssetMetadata {
//!     captured_at: "2024-07-04T12:00:00".parse().ok(),
//!     albums: vec!["Trip".to_string()],
//!     ..Default::default()
//! });
//!
//! let path = resolve(&template, &asset, &ResolveDefaults::default());
//! assert_eq!(path.as_str(), "2024/Trip/IMG_0001.jpg");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod compiler;
mod resolver;
mod sanitize;
mod snapshot;
mod variable;

pub use compiler::{CompiledTemplate, Token};
pub use resolver::{ResolveDefaults, preview, resolve, sample_asset};
pub use sanitize::{PLACEHOLDER, UNSAFE_CHARS, sanitize_segment, sanitize_value};
pub use snapshot::{TemplateRegistry, TemplateSnapshot};
pub use variable::Variable;

//! Darkroom - template-driven storage layout for media libraries
//!
//! Darkroom decides where every photo and video of a self-hosted library
//! lives on disk. A user-editable path template such as
//! `{{y}}/{{album}}/{{filename}}.{{ext}}` is compiled once, resolved per
//! asset, deduplicated against a durable location index, and applied by
//! moving files. Changing the template re-lays out the whole library
//! without losing or overwriting a single file.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use darkroom::{DarkroomConfig, InMemoryCatalog};
//! use std::sync::Arc;
//!
//! # async fn example() -> darkroom::DarkroomResult<()> {
//! let config = DarkroomConfig::load()?;
//! let service = config.service(Arc::new(InMemoryCatalog::new()))?;
//!
//! let report = service.reconcile_all().await?;
//! println!("{} moved, {} failed", report.moved, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `darkroom_error` - Error types
//! - `darkroom_core` - Asset records, storage paths, checksums
//! - `darkroom_template` - Template compiler, path resolver, snapshots
//! - `darkroom_storage` - Location index, collision resolver, mover
//! - `darkroom_reconcile` - Catalog seam, reconciliation driver, service
//!
//! This crate (`darkroom`) re-exports everything and adds configuration,
//! logging setup and the `darkroom` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod observability;

pub use config::{DarkroomConfig, StorageSettings, TemplateSettings};
pub use observability::{ObservabilityConfig, init_observability};

pub use darkroom_core::*;
pub use darkroom_error::*;
pub use darkroom_reconcile::*;
pub use darkroom_storage::*;
pub use darkroom_template::*;

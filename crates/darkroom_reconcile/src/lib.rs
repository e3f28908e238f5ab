//! Reconciliation for Darkroom.
//!
//! Keeps stored files where the active template says they belong:
//!
//! - [`AssetCatalog`]: read-only access to asset records, with
//!   [`InMemoryCatalog`] and the JSON-backed [`ManifestCatalog`]
//! - [`Reconciler`]: plans targets deterministically, then moves files on a
//!   bounded pool and reports one [`AssetOutcome`] per asset
//! - [`StorageTemplateService`]: the facade other services talk to
//!
//! # Example
//!
//! ```rust,no_run
//! use darkroom_reconcile::{InMemoryCatalog, ReconcileSettings, StorageTemplateService};
//! use darkroom_storage::{LocalFilesystem, LocationIndex, RetryPolicy};
//! use darkroom_template::{CompiledTemplate, ResolveDefaults, TemplateRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> darkroom_error::DarkroomResult<()> {
//! let template = CompiledTemplate::compile("{{y}}/{{album}}/{{filename}}.{{ext}}")?;
//! let service = StorageTemplateService::new(
//!     Arc::new(InMemoryCatalog::new()),
//!     Arc::new(TemplateRegistry::new(template, ResolveDefaults::default())),
//!     Arc::new(LocationIndex::open("/srv/media/.darkroom/index.json")?),
//!     Arc::new(LocalFilesystem::new("/srv/media")?),
//!     ReconcileSettings::default(),
//!     RetryPolicy::default(),
//! );
//!
//! let report = service.update_template("{{y}}/{{MM}}/{{filename}}.{{ext}}").await?;
//! println!("moved {} assets", report.moved);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod driver;
mod outcome;
mod service;

pub use catalog::{AssetCatalog, AssetFilter, InMemoryCatalog, ManifestCatalog};
pub use driver::{ReconcileSettings, Reconciler};
pub use outcome::{
    AssetOutcome, AssetResult, AssetState, DuplicatePair, Failure, FailureKind, ReconcileReport,
};
pub use service::{PlannedPath, StorageTemplateService};
pub use tokio_util::sync::CancellationToken;

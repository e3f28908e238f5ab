//! Error types for the Darkroom storage engine.
//!
//! This crate provides the foundation error types used throughout the Darkroom workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use darkroom_error::{DarkroomResult, TemplateError, TemplateErrorKind};
//!
//! fn compile() -> DarkroomResult<()> {
//!     Err(TemplateError::new(TemplateErrorKind::UnknownVariable("colour".to_string())))?
//! }
//!
//! assert!(compile().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
mod error;
mod movement;
mod reserve;
mod storage;
mod template;

pub use catalog::CatalogError;
pub use config::ConfigError;
pub use error::{DarkroomError, DarkroomErrorKind, DarkroomResult};
pub use movement::{MoveError, MoveErrorKind};
pub use reserve::{ReserveError, ReserveErrorKind};
pub use storage::{StorageError, StorageErrorKind};
pub use template::{TemplateError, TemplateErrorKind};

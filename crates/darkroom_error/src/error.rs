//! Top-level error wrapper types.

use crate::{CatalogError, ConfigError, MoveError, ReserveError, StorageError, TemplateError};

/// Every error condition surfaced by the Darkroom crates.
///
/// # Examples
///
/// ```
/// use darkroom_error::{DarkroomError, DarkroomErrorKind, ConfigError};
///
/// let err: DarkroomError = ConfigError::new("bad").into();
/// assert!(matches!(err.kind(), DarkroomErrorKind::Config(_)));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum DarkroomErrorKind {
    /// Template rejected at configuration time
    #[from(TemplateError)]
    Template(TemplateError),
    /// Path reservation refused
    #[from(ReserveError)]
    Reserve(ReserveError),
    /// Filesystem move failed
    #[from(MoveError)]
    Move(MoveError),
    /// Index or storage failure
    #[from(StorageError)]
    Storage(StorageError),
    /// Asset catalog failure
    #[from(CatalogError)]
    Catalog(CatalogError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

/// Darkroom error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Darkroom Error: {}", _0)]
pub struct DarkroomError(Box<DarkroomErrorKind>);

impl DarkroomError {
    /// Create a new error from a kind.
    pub fn new(kind: DarkroomErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &DarkroomErrorKind {
        &self.0
    }

    /// Consume the wrapper and return the kind.
    pub fn into_kind(self) -> DarkroomErrorKind {
        *self.0
    }
}

// Generic From implementation for any type that converts to DarkroomErrorKind
impl<T> From<T> for DarkroomError
where
    T: Into<DarkroomErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Darkroom operations.
pub type DarkroomResult<T> = std::result::Result<T, DarkroomError>;

//! Storage location index errors.

/// Kinds of index and storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Index references a path that is not on disk, or violates injectivity
    #[display("Index corruption: {}", _0)]
    IndexCorruption(String),
    /// Failed to write the index file
    #[display("Failed to persist index: {}", _0)]
    Persist(String),
    /// Failed to read or parse the index file
    #[display("Failed to load index: {}", _0)]
    Load(String),
    /// Generic filesystem failure
    #[display("I/O error: {}", _0)]
    Io(String),
    /// Path is absolute, empty, or escapes the media root
    #[display("Invalid storage path: {}", _0)]
    InvalidPath(String),
    /// Text is not a 64-character hex digest
    #[display("Invalid checksum: {}", _0)]
    InvalidChecksum(String),
    /// Asset has no index entry
    #[display("Asset not indexed: {}", _0)]
    NotFound(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use darkroom_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::NotFound("2024/a.jpg".to_string()));
/// assert!(format!("{}", err).contains("not indexed"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

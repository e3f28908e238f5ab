//! Filesystem move errors and retry classification.

/// Filesystem-level move failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum MoveErrorKind {
    /// Temporary condition (lock contention, interrupted call, timeout)
    #[display("Transient failure: {}", _0)]
    Transient(String),
    /// Insufficient permissions on source or target
    #[display("Permission denied: {}", _0)]
    PermissionDenied(String),
    /// Target device is out of space
    #[display("Storage full: {}", _0)]
    StorageFull(String),
    /// Source file vanished before it could be moved
    #[display("Source missing: {}", _0)]
    SourceMissing(String),
    /// An untracked file already exists at the target
    #[display("Target occupied: {}", _0)]
    TargetOccupied(String),
    /// Cross-device copy did not reproduce the source content
    #[display("Checksum mismatch after copy: {}", _0)]
    ChecksumMismatch(String),
    /// Any other I/O failure
    #[display("I/O failure: {}", _0)]
    Other(String),
}

impl MoveErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MoveErrorKind::Transient(_))
    }

    /// Classify an I/O error raised while operating on `context`.
    pub fn from_io(err: &std::io::Error, context: &str) -> Self {
        use std::io::ErrorKind;

        let message = format!("{}: {}", context, err);
        match err.kind() {
            ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::ResourceBusy => MoveErrorKind::Transient(message),
            ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
                MoveErrorKind::PermissionDenied(message)
            }
            ErrorKind::StorageFull => MoveErrorKind::StorageFull(message),
            ErrorKind::NotFound => MoveErrorKind::SourceMissing(message),
            ErrorKind::AlreadyExists => MoveErrorKind::TargetOccupied(message),
            _ => MoveErrorKind::Other(message),
        }
    }
}

/// Move error with location tracking.
///
/// # Examples
///
/// ```
/// use darkroom_error::{MoveError, MoveErrorKind};
///
/// let err = MoveError::new(MoveErrorKind::Transient("EBUSY".to_string()));
/// assert!(err.kind.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Move Error: {} at line {} in {}", kind, line, file)]
pub struct MoveError {
    /// The kind of error that occurred
    pub kind: MoveErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl MoveError {
    /// Create a new move error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: MoveErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create a move error from an I/O failure.
    #[track_caller]
    pub fn from_io(err: &std::io::Error, context: impl AsRef<str>) -> Self {
        Self::new(MoveErrorKind::from_io(err, context.as_ref()))
    }
}

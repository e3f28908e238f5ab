//! Path reservation errors.

use uuid::Uuid;

/// Reasons a candidate path cannot be reserved for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ReserveErrorKind {
    /// The path belongs to another asset with identical content
    #[display("Duplicate of asset {} at {}", existing, path)]
    DuplicateDetected {
        /// Asset already holding the path
        existing: Uuid,
        /// The contested path
        path: String,
    },
    /// Every suffixed variant of the path up to the bound is taken
    #[display("No free path for {} after {} attempts", path, attempts)]
    ExhaustedSuffixSpace {
        /// The original candidate path
        path: String,
        /// Number of suffixes probed
        attempts: u32,
    },
}

/// Reservation error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Reserve Error: {} at line {} in {}", kind, line, file)]
pub struct ReserveError {
    /// The kind of error that occurred
    pub kind: ReserveErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ReserveError {
    /// Create a new reservation error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ReserveErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// The asset already holding the path, if this is a duplicate.
    pub fn duplicate_of(&self) -> Option<Uuid> {
        match &self.kind {
            ReserveErrorKind::DuplicateDetected { existing, .. } => Some(*existing),
            ReserveErrorKind::ExhaustedSuffixSpace { .. } => None,
        }
    }
}

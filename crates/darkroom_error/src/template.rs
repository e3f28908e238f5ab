//! Template syntax errors.

/// Reasons a storage template is rejected at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TemplateErrorKind {
    /// Template string is empty or whitespace
    #[display("Template is empty")]
    Empty,
    /// A `{{` without a matching `}}`, or a stray `}}`
    #[display("Unbalanced braces at byte {}", _0)]
    UnbalancedBraces(usize),
    /// Variable name is not part of the supported set
    #[display("Unknown variable: {}", _0)]
    UnknownVariable(String),
    /// Format specifier is malformed for its variable
    #[display("Invalid format '{}' for variable '{}'", format, variable)]
    InvalidFormat {
        /// Variable the format was attached to
        variable: String,
        /// The offending format specifier
        format: String,
    },
    /// A literal path segment would escape or alias the media root
    #[display("Illegal path segment: '{}'", _0)]
    IllegalSegment(String),
    /// Template has no token that keeps paths distinct per asset
    #[display("Template must contain {{{{filename}}}} or {{{{assetId}}}}")]
    MissingFilename,
}

/// Template syntax error with location tracking.
///
/// # Examples
///
/// ```
/// use darkroom_error::{TemplateError, TemplateErrorKind};
///
/// let err = TemplateError::new(TemplateErrorKind::UnknownVariable("colour".to_string()));
/// assert!(format!("{}", err).contains("colour"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Syntax Error: {} at line {} in {}", kind, line, file)]
pub struct TemplateError {
    /// The kind of error that occurred
    pub kind: TemplateErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl TemplateError {
    /// Create a new template error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: TemplateErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

//! Template compilation.

use crate::Variable;
use darkroom_error::{TemplateError, TemplateErrorKind};
use tracing::{debug, instrument};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// One element of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Text copied into the path; `/` separates directories
    Literal(String),
    /// Placeholder filled from asset metadata
    Variable(Variable),
}

/// A parsed, validated storage template.
///
/// Immutable once built; share it freely between concurrent resolutions.
///
/// # Examples
///
/// ```
/// use darkroom_template::CompiledTemplate;
///
/// let template: CompiledTemplate = "{{y}}/{{MM}}/{{filename}}.{{ext}}".parse().unwrap();
/// assert_eq!(template.tokens().len(), 7);
/// assert!("{{y}}/{{colour}}".parse::<CompiledTemplate>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    source: String,
    tokens: Vec<Token>,
}

impl CompiledTemplate {
    /// Compile a template string.
    ///
    /// Leading `/` characters are ignored so that every resolved path is
    /// relative to the media root.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] (the syntax error of this subsystem) if the
    /// template is empty, has unbalanced braces, names an unknown variable,
    /// carries a malformed format, has a literal segment that is empty, `.`
    /// or `..`, or contains neither `{{filename}}` nor `{{assetId}}`.
    #[instrument(skip(source), fields(template = %source))]
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let body = source.trim().trim_start_matches('/');
        if body.trim().is_empty() {
            return Err(TemplateError::new(TemplateErrorKind::Empty));
        }

        let tokens = tokenize(body)?;
        validate_segments(&tokens)?;

        if !tokens
            .iter()
            .any(|t| matches!(t, Token::Variable(v) if v.is_identifying()))
        {
            return Err(TemplateError::new(TemplateErrorKind::MissingFilename));
        }

        debug!(tokens = tokens.len(), "Compiled storage template");
        Ok(Self {
            source: source.trim().to_string(),
            tokens,
        })
    }

    /// The template string this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled token sequence.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Variables referenced by the template, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Variable(v) => Some(v),
            Token::Literal(_) => None,
        })
    }
}

impl std::str::FromStr for CompiledTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl std::fmt::Display for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn tokenize(body: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = body;
    let mut offset = 0;

    while !rest.is_empty() {
        let open = rest.find(OPEN);
        let close = rest.find(CLOSE);

        // A closing brace pair in literal text has no opener
        if let Some(c) = close {
            if open.is_none_or(|o| c < o) {
                return Err(TemplateError::new(TemplateErrorKind::UnbalancedBraces(
                    offset + c,
                )));
            }
        }

        let Some(open) = open else {
            tokens.push(Token::Literal(rest.to_string()));
            break;
        };

        if open > 0 {
            tokens.push(Token::Literal(rest[..open].to_string()));
        }

        let inner_start = open + OPEN.len();
        let Some(len) = rest[inner_start..].find(CLOSE) else {
            return Err(TemplateError::new(TemplateErrorKind::UnbalancedBraces(
                offset + open,
            )));
        };
        let inner = &rest[inner_start..inner_start + len];
        if inner.contains(OPEN) {
            return Err(TemplateError::new(TemplateErrorKind::UnbalancedBraces(
                offset + open,
            )));
        }

        let (name, format) = match inner.split_once(':') {
            Some((name, format)) => (name.trim(), Some(format.trim())),
            None => (inner.trim(), None),
        };
        tokens.push(Token::Variable(Variable::parse(name, format)?));

        let consumed = inner_start + len + CLOSE.len();
        rest = &rest[consumed..];
        offset += consumed;
    }

    Ok(tokens)
}

/// Reject directory segments made purely of literal text that are empty,
/// `.` or `..`.
fn validate_segments(tokens: &[Token]) -> Result<(), TemplateError> {
    let mut literal = String::new();
    let mut has_variable = false;

    let check = |literal: &str, has_variable: bool| {
        if !has_variable && matches!(literal.trim(), "" | "." | "..") {
            Err(TemplateError::new(TemplateErrorKind::IllegalSegment(
                literal.to_string(),
            )))
        } else {
            Ok(())
        }
    };

    for token in tokens {
        match token {
            Token::Variable(_) => has_variable = true,
            Token::Literal(text) => {
                let mut pieces = text.split('/');
                if let Some(first) = pieces.next() {
                    literal.push_str(first);
                }
                for piece in pieces {
                    check(&literal, has_variable)?;
                    literal = piece.to_string();
                    has_variable = false;
                }
            }
        }
    }
    check(&literal, has_variable)
}

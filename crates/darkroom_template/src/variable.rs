//! The closed set of template variables.

use chrono::NaiveDate;
use darkroom_error::{TemplateError, TemplateErrorKind};
use std::fmt::Write;

/// Widest zero padding accepted by `{{seq:N}}`.
const MAX_SEQUENCE_WIDTH: u8 = 9;

/// A variable a template may reference.
///
/// Each variant has a fixed default policy, applied by the resolver when the
/// asset lacks the underlying metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    /// `y`: four-digit year
    Year,
    /// `yy`: two-digit year
    YearShort,
    /// `M`: month number
    Month,
    /// `MM`: zero-padded month number
    MonthPadded,
    /// `MMM`: abbreviated English month name
    MonthShortName,
    /// `MMMM`: full English month name
    MonthLongName,
    /// `d`: day of month
    Day,
    /// `dd`: zero-padded day of month
    DayPadded,
    /// `H`: hour (24h)
    Hour,
    /// `HH`: zero-padded hour (24h)
    HourPadded,
    /// `mm`: zero-padded minute
    Minute,
    /// `ss`: zero-padded second
    Second,
    /// `date:<pattern>`: capture time through a strftime pattern
    Date(String),
    /// `filename`: original filename stem
    Filename,
    /// `ext`: lowercased extension
    Extension,
    /// `album`: primary album name
    Album,
    /// `owner`: owner name
    Owner,
    /// `make`: device manufacturer
    Make,
    /// `model`: device model
    Model,
    /// `seq` or `seq:<width>`: sequence within the capture-time bucket
    Sequence {
        /// Minimum digits, zero-padded
        width: u8,
    },
    /// `assetId`: the asset's UUID
    AssetId,
    /// `filetype`: `IMG` or `VID`
    FileType,
    /// `filetypefull`: `IMAGE` or `VIDEO`
    FileTypeFull,
}

impl Variable {
    /// Parse a variable reference from its name and optional format.
    ///
    /// # Errors
    ///
    /// `UnknownVariable` for names outside the closed set; `InvalidFormat`
    /// when a format is given to a variable that takes none, a `seq` width is
    /// not in `1..=9`, or a `date` pattern is empty or not valid strftime.
    pub fn parse(name: &str, format: Option<&str>) -> Result<Self, TemplateError> {
        let plain = match name {
            "y" => Some(Variable::Year),
            "yy" => Some(Variable::YearShort),
            "M" => Some(Variable::Month),
            "MM" => Some(Variable::MonthPadded),
            "MMM" => Some(Variable::MonthShortName),
            "MMMM" => Some(Variable::MonthLongName),
            "d" => Some(Variable::Day),
            "dd" => Some(Variable::DayPadded),
            "H" => Some(Variable::Hour),
            "HH" => Some(Variable::HourPadded),
            "mm" => Some(Variable::Minute),
            "ss" => Some(Variable::Second),
            "filename" => Some(Variable::Filename),
            "ext" => Some(Variable::Extension),
            "album" => Some(Variable::Album),
            "owner" => Some(Variable::Owner),
            "make" => Some(Variable::Make),
            "model" => Some(Variable::Model),
            "assetId" => Some(Variable::AssetId),
            "filetype" => Some(Variable::FileType),
            "filetypefull" => Some(Variable::FileTypeFull),
            _ => None,
        };

        if let Some(variable) = plain {
            return match format {
                None => Ok(variable),
                Some(f) => Err(invalid_format(name, f)),
            };
        }

        match name {
            "seq" => {
                let width = match format {
                    None => 1,
                    Some(f) => f
                        .parse::<u8>()
                        .ok()
                        .filter(|w| (1..=MAX_SEQUENCE_WIDTH).contains(w))
                        .ok_or_else(|| invalid_format(name, f))?,
                };
                Ok(Variable::Sequence { width })
            }
            "date" => {
                let pattern = format.unwrap_or_default();
                validate_date_pattern(pattern).map_err(|_| invalid_format(name, pattern))?;
                Ok(Variable::Date(pattern.to_string()))
            }
            _ => Err(TemplateError::new(TemplateErrorKind::UnknownVariable(
                name.to_string(),
            ))),
        }
    }

    /// Whether this variable keeps paths of different assets apart.
    pub fn is_identifying(&self) -> bool {
        matches!(self, Variable::Filename | Variable::AssetId)
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Variable::Year => "y",
            Variable::YearShort => "yy",
            Variable::Month => "M",
            Variable::MonthPadded => "MM",
            Variable::MonthShortName => "MMM",
            Variable::MonthLongName => "MMMM",
            Variable::Day => "d",
            Variable::DayPadded => "dd",
            Variable::Hour => "H",
            Variable::HourPadded => "HH",
            Variable::Minute => "mm",
            Variable::Second => "ss",
            Variable::Date(pattern) => return write!(f, "{{{{date:{}}}}}", pattern),
            Variable::Filename => "filename",
            Variable::Extension => "ext",
            Variable::Album => "album",
            Variable::Owner => "owner",
            Variable::Make => "make",
            Variable::Model => "model",
            Variable::Sequence { width: 1 } => "seq",
            Variable::Sequence { width } => return write!(f, "{{{{seq:{}}}}}", width),
            Variable::AssetId => "assetId",
            Variable::FileType => "filetype",
            Variable::FileTypeFull => "filetypefull",
        };
        write!(f, "{{{{{}}}}}", name)
    }
}

fn invalid_format(variable: &str, format: &str) -> TemplateError {
    TemplateError::new(TemplateErrorKind::InvalidFormat {
        variable: variable.to_string(),
        format: format.to_string(),
    })
}

/// Reject empty patterns and anything chrono cannot render for a
/// timezone-less timestamp (unknown specifiers, `%z`, `%Z`, ...).
fn validate_date_pattern(pattern: &str) -> Result<(), std::fmt::Error> {
    if pattern.trim().is_empty() {
        return Err(std::fmt::Error);
    }
    let sample_date = NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or(std::fmt::Error)?;
    let mut rendered = String::new();
    write!(rendered, "{}", sample_date.format(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_variables_reject_formats() {
        let err = Variable::parse("y", Some("4")).unwrap_err();
        assert!(matches!(err.kind, TemplateErrorKind::InvalidFormat { .. }));
    }

    #[test]
    fn test_sequence_width_bounds() {
        assert_eq!(
            Variable::parse("seq", Some("4")).unwrap(),
            Variable::Sequence { width: 4 }
        );
        assert!(Variable::parse("seq", Some("0")).is_err());
        assert!(Variable::parse("seq", Some("10")).is_err());
        assert!(Variable::parse("seq", Some("four")).is_err());
    }

    #[test]
    fn test_date_patterns() {
        assert!(Variable::parse("date", Some("%Y-%m")).is_ok());
        assert!(Variable::parse("date", Some("%Q")).is_err());
        assert!(Variable::parse("date", Some("%z")).is_err());
        assert!(Variable::parse("date", None).is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for source in ["y", "MMMM", "seq", "assetId"] {
            let var = Variable::parse(source, None).unwrap();
            assert_eq!(var.to_string(), format!("{{{{{}}}}}", source));
        }
        let seq = Variable::parse("seq", Some("3")).unwrap();
        assert_eq!(seq.to_string(), "{{seq:3}}");
    }
}

//! Deterministic replacement of filesystem-unsafe characters.
//!
//! | Character | Replacement |
//! |---|---|
//! | `/` `\` | `_` (values never introduce directories) |
//! | `:` `*` `?` `"` `<` `>` `\|` | `_` (reserved on common filesystems) |
//! | ASCII/Unicode control characters | `_` |
//!
//! After character replacement each path segment loses leading and trailing
//! whitespace and trailing dots.

/// Character substituted for every unsafe character.
pub const PLACEHOLDER: char = '_';

/// Printable characters that never survive into a resolved path.
pub const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn is_unsafe(c: char) -> bool {
    UNSAFE_CHARS.contains(&c) || c.is_control()
}

/// Replace unsafe characters in a metadata value.
///
/// # Examples
///
/// ```
/// use darkroom_template::sanitize_value;
///
/// assert_eq!(sanitize_value("AC/DC: Live?"), "AC_DC_ Live_");
/// ```
pub fn sanitize_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if is_unsafe(c) { PLACEHOLDER } else { c })
        .collect()
}

/// Sanitize one assembled path segment.
///
/// The result may be empty; callers substitute a default for that case.
pub fn sanitize_segment(segment: &str) -> String {
    sanitize_value(segment)
        .trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_unsafe_char_is_replaced() {
        for c in UNSAFE_CHARS {
            assert_eq!(sanitize_value(&c.to_string()), "_");
        }
        assert_eq!(sanitize_value("a\tb\n"), "a_b_");
    }

    #[test]
    fn test_segment_trimming() {
        assert_eq!(sanitize_segment("  Holiday . "), "Holiday");
        assert_eq!(sanitize_segment("..."), "");
        assert_eq!(sanitize_segment(".hidden"), ".hidden");
    }

    #[test]
    fn test_unicode_is_preserved() {
        assert_eq!(sanitize_value("Zürich 東京"), "Zürich 東京");
    }
}

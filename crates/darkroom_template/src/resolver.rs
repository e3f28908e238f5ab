//! Path resolution: compiled template + asset metadata → relative path.

use crate::{CompiledTemplate, Token, Variable, sanitize_segment, sanitize_value};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use darkroom_core::{AssetId, AssetKind, AssetMetadata, AssetRecord, Checksum, StoragePath};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Extension used when neither metadata nor the original path supply one.
const DEFAULT_EXTENSION: &str = "bin";

/// Substitutes for metadata an asset does not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveDefaults {
    /// Used for missing dates, owner, device and for unusable segments
    #[serde(default = "default_unknown")]
    pub unknown: String,
    /// Used for `{{album}}` when the asset belongs to no album
    #[serde(default = "default_unknown")]
    pub no_album: String,
}

fn default_unknown() -> String {
    "Unknown".to_string()
}

impl Default for ResolveDefaults {
    fn default() -> Self {
        Self {
            unknown: default_unknown(),
            no_album: default_unknown(),
        }
    }
}

/// Resolve a template for an asset.
///
/// Pure and total: the same template, asset and defaults always produce the
/// same non-empty relative path.
pub fn resolve(
    template: &CompiledTemplate,
    asset: &AssetRecord,
    defaults: &ResolveDefaults,
) -> StoragePath {
    let mut segments = Vec::new();
    let mut current = String::new();

    for token in template.tokens() {
        match token {
            Token::Literal(text) => {
                let mut pieces = text.split('/');
                if let Some(first) = pieces.next() {
                    current.push_str(first);
                }
                for piece in pieces {
                    segments.push(std::mem::take(&mut current));
                    current.push_str(piece);
                }
            }
            Token::Variable(variable) => {
                current.push_str(&sanitize_value(&render(variable, asset, defaults)));
            }
        }
    }
    segments.push(current);

    StoragePath::from_segments(
        segments.iter().map(|s| sanitize_segment(s)),
        &defaults.unknown,
    )
}

/// A fixed asset for previewing templates.
pub fn sample_asset() -> AssetRecord {
    let captured_at = NaiveDate::from_ymd_opt(2022, 2, 3).and_then(|d| d.and_hms_opt(4, 56, 5));
    AssetRecord {
        id: AssetId::from(uuid::Uuid::nil()),
        checksum: Checksum::of_bytes(b"sample"),
        kind: AssetKind::Image,
        original_path: StoragePath::from_segments(["upload", "IMG_123.jpg"], "_"),
        owner: Some("admin".to_string()),
        metadata: AssetMetadata {
            captured_at,
            filename: Some("IMG_123".to_string()),
            extension: Some("jpg".to_string()),
            make: Some("Canon".to_string()),
            model: Some("EOS R5".to_string()),
            albums: vec!["Album Name".to_string()],
            sequence: Some(1),
        },
    }
}

/// Resolve a template against [`sample_asset`].
///
/// # Examples
///
/// ```
/// use darkroom_template::{CompiledTemplate, ResolveDefaults, preview};
///
/// let template = CompiledTemplate::compile("{{y}}/{{y}}-{{MM}}-{{dd}}/{{filename}}.{{ext}}").unwrap();
/// assert_eq!(
///     preview(&template, &ResolveDefaults::default()).as_str(),
///     "2022/2022-02-03/IMG_123.jpg"
/// );
/// ```
pub fn preview(template: &CompiledTemplate, defaults: &ResolveDefaults) -> StoragePath {
    resolve(template, &sample_asset(), defaults)
}

fn render(variable: &Variable, asset: &AssetRecord, defaults: &ResolveDefaults) -> String {
    let meta = &asset.metadata;
    let unknown = || defaults.unknown.clone();

    match variable {
        Variable::Year => on_date(meta, |d| format!("{:04}", d.year())),
        Variable::YearShort => on_date(meta, |d| format!("{:02}", d.year().rem_euclid(100))),
        Variable::Month => on_date(meta, |d| d.month().to_string()),
        Variable::MonthPadded => on_date(meta, |d| format!("{:02}", d.month())),
        Variable::MonthShortName => on_date(meta, |d| d.format("%b").to_string()),
        Variable::MonthLongName => on_date(meta, |d| d.format("%B").to_string()),
        Variable::Day => on_date(meta, |d| d.day().to_string()),
        Variable::DayPadded => on_date(meta, |d| format!("{:02}", d.day())),
        Variable::Hour => on_date(meta, |d| d.hour().to_string()),
        Variable::HourPadded => on_date(meta, |d| format!("{:02}", d.hour())),
        Variable::Minute => on_date(meta, |d| format!("{:02}", d.minute())),
        Variable::Second => on_date(meta, |d| format!("{:02}", d.second())),
        Variable::Date(pattern) => meta.captured_at.as_ref().and_then(|d| {
            let mut out = String::new();
            write!(out, "{}", d.format(pattern)).ok().map(|_| out)
        }),
        Variable::Filename => Some(
            present(&meta.filename)
                .map(str::to_string)
                .or_else(|| original_stem(asset).map(str::to_string))
                .unwrap_or_else(|| asset.id.to_string()),
        ),
        Variable::Extension => Some(
            present(&meta.extension)
                .map(|e| e.trim_start_matches('.'))
                .filter(|e| !e.is_empty())
                .or_else(|| original_extension(asset))
                .map(str::to_lowercase)
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        ),
        Variable::Album => Some(
            meta.primary_album()
                .map(str::to_string)
                .unwrap_or_else(|| defaults.no_album.clone()),
        ),
        Variable::Owner => present(&asset.owner).map(str::to_string),
        Variable::Make => present(&meta.make).map(str::to_string),
        Variable::Model => present(&meta.model).map(str::to_string),
        Variable::Sequence { width } => Some(format!(
            "{:0width$}",
            meta.sequence.unwrap_or(0),
            width = *width as usize
        )),
        Variable::AssetId => Some(asset.id.to_string()),
        Variable::FileType => Some(asset.kind.short_label().to_string()),
        Variable::FileTypeFull => Some(asset.kind.long_label().to_string()),
    }
    .unwrap_or_else(unknown)
}

fn on_date(meta: &AssetMetadata, f: impl FnOnce(&NaiveDateTime) -> String) -> Option<String> {
    meta.captured_at.as_ref().map(f)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn split_original(asset: &AssetRecord) -> (&str, Option<&str>) {
    let name = asset.original_path.file_name();
    match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], Some(&name[dot + 1..])),
        _ => (name, None),
    }
}

fn original_stem(asset: &AssetRecord) -> Option<&str> {
    Some(split_original(asset).0).filter(|s| !s.is_empty())
}

fn original_extension(asset: &AssetRecord) -> Option<&str> {
    split_original(asset).1.filter(|e| !e.is_empty())
}

//! Tests for template resolution.

use darkroom_core::{AssetId, AssetKind, AssetMetadata, AssetRecord, Checksum, StoragePath};
use darkroom_template::{CompiledTemplate, ResolveDefaults, TemplateRegistry, preview, resolve};

fn asset(original: &str, metadata: AssetMetadata) -> AssetRecord {
    AssetRecord::new(
        AssetId::new(),
        Checksum::of_bytes(original.as_bytes()),
        AssetKind::Image,
        StoragePath::new(original).unwrap(),
    )
    .with_metadata(metadata)
}

fn in_album(album: &str) -> AssetMetadata {
    AssetMetadata {
        captured_at: "2024-03-09T08:07:06".parse().ok(),
        filename: Some("IMG_0001".to_string()),
        extension: Some("jpg".to_string()),
        albums: vec![album.to_string()],
        ..Default::default()
    }
}

#[test]
fn test_album_template_separates_albums() {
    let template = CompiledTemplate::compile("{{y}}/{{album}}/{{filename}}.{{ext}}").unwrap();
    let defaults = ResolveDefaults::default();

    let trip = asset("upload/a.jpg", in_album("Trip"));
    let home = asset("upload/b.jpg", in_album("Home"));

    assert_eq!(resolve(&template, &trip, &defaults).as_str(), "2024/Trip/IMG_0001.jpg");
    assert_eq!(resolve(&template, &home, &defaults).as_str(), "2024/Home/IMG_0001.jpg");
}

#[test]
fn test_date_tokens() {
    let template = CompiledTemplate::compile(
        "{{yy}}-{{M}}-{{d}} {{H}}h{{mm}}m{{ss}}s/{{MMM}}-{{MMMM}}/{{date:%Y%m%d}}_{{filename}}",
    )
    .unwrap();
    let a = asset("upload/x.jpg", in_album("Trip"));
    assert_eq!(
        resolve(&template, &a, &ResolveDefaults::default()).as_str(),
        "24-3-9 8h07m06s/Mar-March/20240309_IMG_0001"
    );
}

#[test]
fn test_missing_metadata_uses_defaults() {
    let template =
        CompiledTemplate::compile("{{y}}/{{album}}/{{make}}-{{model}}/{{filename}}.{{ext}}")
            .unwrap();
    let defaults = ResolveDefaults {
        unknown: "Unknown".to_string(),
        no_album: "Unsorted".to_string(),
    };
    let a = asset("upload/DSC_42.NEF", AssetMetadata::default());

    // filename and extension fall back to the original path
    assert_eq!(
        resolve(&template, &a, &defaults).as_str(),
        "Unknown/Unsorted/Unknown-Unknown/DSC_42.nef"
    );
}

#[test]
fn test_missing_everything_still_resolves() {
    let template = CompiledTemplate::compile("{{owner}}/{{filename}}.{{ext}}").unwrap();
    let a = asset("upload/noext", AssetMetadata::default());
    assert_eq!(
        resolve(&template, &a, &ResolveDefaults::default()).as_str(),
        "Unknown/noext.bin"
    );
}

#[test]
fn test_values_are_sanitized() {
    let template = CompiledTemplate::compile("{{album}}/{{filename}}.{{ext}}").unwrap();
    let meta = AssetMetadata {
        filename: Some("a/b:c".to_string()),
        extension: Some(".JPG".to_string()),
        albums: vec!["../../etc".to_string()],
        ..Default::default()
    };
    let a = asset("upload/x.jpg", meta);
    assert_eq!(
        resolve(&template, &a, &ResolveDefaults::default()).as_str(),
        ".._.._etc/a_b_c.jpg"
    );
}

#[test]
fn test_album_of_only_dots_becomes_unknown() {
    let template = CompiledTemplate::compile("{{album}}/{{filename}}").unwrap();
    let meta = AssetMetadata {
        albums: vec!["..".to_string()],
        ..Default::default()
    };
    let a = asset("upload/x.jpg", meta);
    assert_eq!(
        resolve(&template, &a, &ResolveDefaults::default()).as_str(),
        "Unknown/x"
    );
}

#[test]
fn test_sequence_padding_and_kind_labels() {
    let template =
        CompiledTemplate::compile("{{filetypefull}}/{{filetype}}_{{seq:4}}_{{seq}}_{{assetId}}")
            .unwrap();
    let mut a = asset(
        "upload/clip.mp4",
        AssetMetadata {
            sequence: Some(7),
            ..Default::default()
        },
    );
    a.kind = AssetKind::Video;
    assert_eq!(
        resolve(&template, &a, &ResolveDefaults::default()).as_str(),
        format!("VIDEO/VID_0007_7_{}", a.id)
    );
}

#[test]
fn test_resolution_is_deterministic() {
    let template = CompiledTemplate::compile("{{y}}/{{album}}/{{filename}}.{{ext}}").unwrap();
    let a = asset("upload/a.jpg", in_album("Trip"));
    let defaults = ResolveDefaults::default();
    let first = resolve(&template, &a, &defaults);
    for _ in 0..10 {
        assert_eq!(resolve(&template, &a, &defaults), first);
    }
}

#[test]
fn test_preview_uses_sample_asset() {
    let template = CompiledTemplate::compile("{{owner}}/{{make}} {{model}}/{{filename}}.{{ext}}")
        .unwrap();
    assert_eq!(
        preview(&template, &ResolveDefaults::default()).as_str(),
        "admin/Canon EOS R5/IMG_123.jpg"
    );
}

#[test]
fn test_snapshot_resolution_binds_to_version() {
    let registry = TemplateRegistry::new(
        CompiledTemplate::compile("{{y}}/{{filename}}.{{ext}}").unwrap(),
        ResolveDefaults::default(),
    );
    let a = asset("upload/a.jpg", in_album("Trip"));

    let old = registry.snapshot();
    registry.update("{{album}}/{{filename}}.{{ext}}").unwrap();
    let new = registry.snapshot();

    assert_eq!(old.resolve(&a).as_str(), "2024/IMG_0001.jpg");
    assert_eq!(new.resolve(&a).as_str(), "Trip/IMG_0001.jpg");
    assert_eq!(*new.version(), 2);
}

#[test]
fn test_update_defaults_keeps_template() {
    let registry = TemplateRegistry::new(
        CompiledTemplate::compile("{{album}}/{{filename}}").unwrap(),
        ResolveDefaults::default(),
    );
    let snapshot = registry.update_defaults(ResolveDefaults {
        unknown: "?".to_string(),
        no_album: "Loose".to_string(),
    });
    assert_eq!(snapshot.template().source(), "{{album}}/{{filename}}");
    let a = asset("upload/a.jpg", AssetMetadata::default());
    assert_eq!(snapshot.resolve(&a).as_str(), "Loose/a");
}

//! Command handlers.

use darkroom::{
    AssetFilter, AssetId, AssetOutcome, CancellationToken, CompiledTemplate, DarkroomConfig,
    ManifestCatalog, ReconcileReport, preview as preview_path,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Compile a pattern and show what it produces.
pub fn validate(pattern: &str) -> CliResult {
    let template = CompiledTemplate::compile(pattern)?;
    let sample = preview_path(&template, &Default::default());
    println!("Template is valid: {}", template);
    println!("Sample path: {}", sample);
    Ok(())
}

/// Print the sample path for `pattern`, or for the configured template.
pub fn preview(config: &DarkroomConfig, pattern: Option<&str>) -> CliResult {
    let template = match pattern {
        Some(p) => CompiledTemplate::compile(p)?,
        None => config.template.compile()?,
    };
    println!("{}", preview_path(&template, &config.template.defaults()));
    Ok(())
}

/// Show current and target paths for a manifest.
pub async fn plan(config: &DarkroomConfig, manifest: &Path, json: bool) -> CliResult {
    let catalog = ManifestCatalog::open(manifest).await?;
    let service = config.service(Arc::new(catalog))?;
    let planned = service.plan(&AssetFilter::all()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    let mut changes = 0;
    for entry in &planned {
        let current = entry
            .current
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(not placed)".to_string());
        let marker = if entry.changes() { "->" } else { "==" };
        if entry.changes() {
            changes += 1;
        }
        println!("{}  {} {} {}", entry.asset_id, current, marker, entry.target);
    }
    println!("{} of {} assets would move", changes, planned.len());
    Ok(())
}

/// Reconcile a manifest. Ctrl-C stops before the next move starts.
pub async fn reconcile(config: &DarkroomConfig, manifest: &Path, json: bool) -> CliResult {
    let catalog = ManifestCatalog::open(manifest).await?;
    let service = config.service(Arc::new(catalog))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing moves in flight");
            on_signal.cancel();
        }
    });

    let report = service
        .reconcile_matching(&AssetFilter::all(), &cancel)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.failed > 0 {
        return Err(format!("{} assets failed to reconcile", report.failed).into());
    }
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    for result in &report.results {
        match &result.outcome {
            AssetOutcome::Moved { from, to } => {
                println!("moved     {}  {} -> {}", result.asset_id, from, to)
            }
            AssetOutcome::Placed { to } => println!("placed    {}  {}", result.asset_id, to),
            AssetOutcome::Unchanged { .. } => {}
            AssetOutcome::Duplicate { existing } => {
                println!("duplicate {}  of {}", result.asset_id, existing)
            }
            AssetOutcome::Failed { kind, message } => {
                println!("failed    {}  [{}] {}", result.asset_id, kind, message)
            }
            AssetOutcome::Cancelled => println!("cancelled {}", result.asset_id),
        }
    }
    println!(
        "Template v{}: {} total, {} moved, {} skipped, {} failed, {} cancelled",
        report.template_version,
        report.total,
        report.moved,
        report.skipped,
        report.failed,
        report.cancelled
    );
}

/// Print the absolute location of an indexed asset.
pub fn locate(config: &DarkroomConfig, asset_id: AssetId) -> CliResult {
    let index = config.open_index()?;
    match index.get(asset_id) {
        Some(path) => {
            println!("{}", path.under(&config.storage.media_root).display());
            Ok(())
        }
        None => Err(format!("asset {} is not indexed", asset_id).into()),
    }
}

/// Remove an asset from the index. The file itself is left alone.
pub async fn forget(config: &DarkroomConfig, asset_id: AssetId) -> CliResult {
    let index = config.open_index()?;
    match index.remove(asset_id).await? {
        Some(entry) => {
            info!(asset_id = %asset_id, path = %entry.path, "Forgot asset");
            println!("Forgot {} (was at {})", asset_id, entry.path);
        }
        None => println!("{} was not indexed", asset_id),
    }
    Ok(())
}

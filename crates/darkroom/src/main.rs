//! Darkroom CLI binary.
//!
//! This binary provides command-line access to Darkroom's functionality:
//! - Validate and preview path templates
//! - Plan and run reconciliation of a library described by a JSON manifest
//! - Look up and forget indexed assets

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands};
    use darkroom::{DarkroomConfig, ObservabilityConfig, init_observability};

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    init_observability(ObservabilityConfig::verbose(cli.verbose).with_json_logs(cli.json_logs))?;

    // Template validation needs no configuration
    if let Commands::Validate { pattern } = &cli.command {
        return cli::validate(pattern);
    }

    let config = DarkroomConfig::load_with(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { .. } => {}
        Commands::Preview { pattern } => cli::preview(&config, pattern.as_deref())?,
        Commands::Plan { manifest, json } => cli::plan(&config, &manifest, json).await?,
        Commands::Reconcile { manifest, json } => cli::reconcile(&config, &manifest, json).await?,
        Commands::Locate { asset_id } => cli::locate(&config, asset_id)?,
        Commands::Forget { asset_id } => cli::forget(&config, asset_id).await?,
    }

    Ok(())
}

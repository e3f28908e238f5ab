//! CLI command definitions.

use clap::{Parser, Subcommand};
use darkroom::AssetId;
use std::path::PathBuf;

/// Darkroom - template-driven storage layout for photo and video libraries
#[derive(Parser, Debug)]
#[command(name = "darkroom")]
#[command(about = "Template-driven storage layout for photo and video libraries", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered above the user configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that a template compiles
    Validate {
        /// Template pattern, e.g. "{{y}}/{{album}}/{{filename}}.{{ext}}"
        pattern: String,
    },

    /// Show the path a template produces for a sample asset
    Preview {
        /// Template pattern; the configured one when omitted
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Show where each asset of a manifest would go, without moving anything
    Plan {
        /// JSON manifest listing the assets
        #[arg(long)]
        manifest: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Move every asset of a manifest to where the template puts it
    Reconcile {
        /// JSON manifest listing the assets
        #[arg(long)]
        manifest: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the stored location of an asset
    Locate {
        /// Asset UUID
        asset_id: AssetId,
    },

    /// Drop an asset from the location index
    Forget {
        /// Asset UUID
        asset_id: AssetId,
    },
}

//! Configuration loading.
//!
//! Sources, later ones overriding earlier ones:
//! - Bundled defaults (include_str! from darkroom.toml)
//! - `~/.config/darkroom/darkroom.toml`
//! - `./darkroom.toml`
//! - An explicit file, e.g. from `--config`
//! - `DARKROOM_*` environment variables, sections separated by `__`
//!   (`DARKROOM_STORAGE__MEDIA_ROOT=/srv/media`)

use ::config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use darkroom_error::{ConfigError, DarkroomResult};
use darkroom_reconcile::{AssetCatalog, ReconcileSettings, StorageTemplateService};
use darkroom_storage::{LocalFilesystem, LocationIndex, RetryPolicy};
use darkroom_template::{CompiledTemplate, ResolveDefaults, TemplateRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Bundled default configuration
const DEFAULT_CONFIG: &str = include_str!("../../../darkroom.toml");

/// Where media files and the location index live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory every storage path is relative to
    pub media_root: PathBuf,
    /// Location index file; `<media_root>/.darkroom/index.json` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,
}

impl StorageSettings {
    /// The location index file.
    pub fn index_path(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.media_root.join(".darkroom").join("index.json"))
    }
}

/// The active path template and its fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Template pattern, e.g. `{{y}}/{{album}}/{{filename}}.{{ext}}`
    pub pattern: String,
    /// Label for missing metadata
    #[serde(default = "default_label")]
    pub unknown: String,
    /// Label for `{{album}}` when an asset is in no album
    #[serde(default = "default_label")]
    pub no_album: String,
}

fn default_label() -> String {
    ResolveDefaults::default().unknown
}

impl TemplateSettings {
    /// Fallback labels for resolution.
    pub fn defaults(&self) -> ResolveDefaults {
        ResolveDefaults {
            unknown: self.unknown.clone(),
            no_album: self.no_album.clone(),
        }
    }

    /// Compile the pattern.
    ///
    /// # Errors
    ///
    /// Returns a syntax error if the pattern is invalid.
    pub fn compile(&self) -> DarkroomResult<CompiledTemplate> {
        Ok(CompiledTemplate::compile(&self.pattern)?)
    }
}

/// Top-level Darkroom configuration.
///
/// # Example
///
/// ```no_run
/// use darkroom::DarkroomConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DarkroomConfig::load()?;
/// println!("Media root: {}", config.storage.media_root.display());
/// println!("Template: {}", config.template.pattern);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DarkroomConfig {
    /// Media root and index location
    pub storage: StorageSettings,
    /// Active template
    pub template: TemplateSettings,
    /// Reconciliation tuning
    #[serde(default)]
    pub reconcile: ReconcileSettings,
    /// Backoff for transient filesystem errors
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl DarkroomConfig {
    /// Load configuration from every source.
    ///
    /// # Errors
    ///
    /// Returns error if a file cannot be parsed or the template is invalid.
    pub fn load() -> DarkroomResult<Self> {
        Self::load_with(None)
    }

    /// Load configuration from every source, layering `explicit` above the
    /// user files and below the environment.
    ///
    /// # Errors
    ///
    /// Returns error if `explicit` does not exist, a file cannot be parsed,
    /// or the template is invalid.
    #[instrument]
    pub fn load_with(explicit: Option<&Path>) -> DarkroomResult<Self> {
        debug!("Loading configuration: env > explicit > current dir > home dir > bundled defaults");

        let mut builder = Self::defaults();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/darkroom/darkroom.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("darkroom").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("DARKROOM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    /// Load the bundled defaults overlaid with a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the template
    /// is invalid.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> DarkroomResult<Self> {
        Self::finish(Self::defaults().add_source(File::from(path.as_ref())))
    }

    /// Load the bundled defaults overlaid with TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or the template is
    /// invalid.
    pub fn from_toml(toml: &str) -> DarkroomResult<Self> {
        Self::finish(Self::defaults().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn defaults() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> DarkroomResult<Self> {
        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> DarkroomResult<()> {
        CompiledTemplate::compile(&self.template.pattern).map_err(|e| {
            ConfigError::new(format!(
                "Invalid template {:?}: {}",
                self.template.pattern, e.kind
            ))
        })?;
        if *self.reconcile.concurrency() == 0 {
            return Err(ConfigError::new("reconcile.concurrency must be at least 1").into());
        }
        if self.storage.media_root.as_os_str().is_empty() {
            return Err(ConfigError::new("storage.media_root must not be empty").into());
        }
        Ok(())
    }

    /// Open the location index.
    ///
    /// # Errors
    ///
    /// Returns error if the index file exists but cannot be loaded.
    pub fn open_index(&self) -> DarkroomResult<LocationIndex> {
        Ok(LocationIndex::open(self.storage.index_path())?)
    }

    /// Wire a [`StorageTemplateService`] over `catalog` from this
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the media root cannot be created, the index cannot
    /// be loaded or the template is invalid.
    #[instrument(skip(self, catalog), fields(media_root = %self.storage.media_root.display()))]
    pub fn service(&self, catalog: Arc<dyn AssetCatalog>) -> DarkroomResult<StorageTemplateService> {
        let template = self.template.compile()?;
        let registry = TemplateRegistry::new(template, self.template.defaults());
        let backend = LocalFilesystem::new(&self.storage.media_root)?;
        let index = self.open_index()?;

        info!(
            template = %self.template.pattern,
            indexed = index.len(),
            "Storage template service ready"
        );
        Ok(StorageTemplateService::new(
            catalog,
            Arc::new(registry),
            Arc::new(index),
            Arc::new(backend),
            self.reconcile.clone(),
            self.retry.clone(),
        ))
    }
}

//! Process-wide active template with versioned, immutable snapshots.

use crate::{CompiledTemplate, ResolveDefaults, resolve};
use darkroom_core::{AssetRecord, StoragePath};
use darkroom_error::TemplateError;
use derive_getters::Getters;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, instrument, warn};

/// One immutable version of the active template.
///
/// Resolution binds to a single snapshot for its whole duration, so a
/// concurrent template change never yields a half-updated path.
#[derive(Debug, Clone, Getters)]
pub struct TemplateSnapshot {
    /// Monotonic version, starting at 1
    version: u64,
    /// The compiled template
    template: CompiledTemplate,
    /// Defaults applied for missing metadata
    defaults: ResolveDefaults,
}

impl TemplateSnapshot {
    /// Resolve an asset's path under this snapshot.
    pub fn resolve(&self, asset: &AssetRecord) -> StoragePath {
        resolve(&self.template, asset, &self.defaults)
    }
}

/// Holder of the currently active [`TemplateSnapshot`].
///
/// # Examples
///
/// ```
/// use darkroom_template::{CompiledTemplate, ResolveDefaults, TemplateRegistry};
///
/// let initial = CompiledTemplate::compile("{{y}}/{{filename}}.{{ext}}").unwrap();
/// let registry = TemplateRegistry::new(initial, ResolveDefaults::default());
/// assert_eq!(*registry.snapshot().version(), 1);
///
/// // A bad template leaves the previous snapshot active
/// assert!(registry.update("{{nope}}").is_err());
/// assert_eq!(*registry.snapshot().version(), 1);
///
/// registry.update("{{album}}/{{filename}}.{{ext}}").unwrap();
/// assert_eq!(*registry.snapshot().version(), 2);
/// ```
#[derive(Debug)]
pub struct TemplateRegistry {
    current: RwLock<Arc<TemplateSnapshot>>,
}

impl TemplateRegistry {
    /// Create a registry with an initial template as version 1.
    pub fn new(template: CompiledTemplate, defaults: ResolveDefaults) -> Self {
        Self {
            current: RwLock::new(Arc::new(TemplateSnapshot {
                version: 1,
                template,
                defaults,
            })),
        }
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<TemplateSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Compile `pattern` and make it the active template.
    ///
    /// Compilation happens before the lock is taken; on error the previous
    /// snapshot stays active.
    ///
    /// # Errors
    ///
    /// Returns the template's syntax error.
    #[instrument(skip(self))]
    pub fn update(&self, pattern: &str) -> Result<Arc<TemplateSnapshot>, TemplateError> {
        let template = CompiledTemplate::compile(pattern).inspect_err(|e| {
            warn!(error = %e, "Rejected storage template, keeping previous");
        })?;
        Ok(self.install(Some(template), None))
    }

    /// Replace the defaults while keeping the template.
    pub fn update_defaults(&self, defaults: ResolveDefaults) -> Arc<TemplateSnapshot> {
        self.install(None, Some(defaults))
    }

    fn install(
        &self,
        template: Option<CompiledTemplate>,
        defaults: Option<ResolveDefaults>,
    ) -> Arc<TemplateSnapshot> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(TemplateSnapshot {
            version: current.version + 1,
            template: template.unwrap_or_else(|| current.template.clone()),
            defaults: defaults.unwrap_or_else(|| current.defaults.clone()),
        });
        *current = next.clone();
        info!(
            version = next.version,
            template = %next.template,
            "Activated storage template"
        );
        next
    }
}

//! Runtime context for command execution.
//!
//! The [`RuntimeContext`] holds what every command handler needs: the
//! discovered `.tally/` directory, extra catalogue layers from the command
//! line and the global output flags. Configuration and the parameter
//! registry are loaded on demand, since `init` and `version` need neither.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_config::{TallyConfig, find_tally_dir, load_config, project_root};
use tally_core::catalogue::load_layer;
use tally_core::{Catalogue, DocumentId, Registry};
use tally_workbook::LayoutOptions;
use tracing::debug;

use crate::cli::GlobalArgs;

/// Runtime context passed to every command handler.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Explicit `.tally/` directory from `--config`.
    pub tally_dir: Option<PathBuf>,

    /// Catalogue layers from `--catalogue`, applied after configured overlays.
    pub catalogues: Vec<PathBuf>,

    /// Whether to produce JSON output.
    pub json: bool,

    /// Verbose output.
    pub verbose: bool,

    /// Quiet mode: suppress non-essential output.
    pub quiet: bool,
}

impl RuntimeContext {
    /// Build a `RuntimeContext` from parsed global arguments.
    pub fn from_global_args(global: &GlobalArgs) -> Self {
        Self {
            tally_dir: global.config.clone(),
            catalogues: global.catalogues.clone(),
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
        }
    }

    /// The `.tally/` directory in effect, if any.
    pub fn resolve_tally_dir(&self) -> Option<PathBuf> {
        if let Some(ref dir) = self.tally_dir {
            return Some(dir.clone());
        }
        let cwd = env::current_dir().ok()?;
        find_tally_dir(&cwd)
    }

    /// Directory that relative paths in the config are resolved against.
    pub fn project_root(&self) -> Result<PathBuf> {
        match self.resolve_tally_dir() {
            Some(dir) => Ok(project_root(&dir)),
            None => env::current_dir().context("failed to get current directory"),
        }
    }

    /// Loads the configuration; defaults apply when no `.tally/` exists.
    pub fn load_config(&self) -> Result<TallyConfig> {
        match self.resolve_tally_dir() {
            Some(dir) => {
                debug!(dir = %dir.display(), "loading config");
                load_config(&dir).with_context(|| format!("failed to load config from {}", dir.display()))
            }
            None => Ok(TallyConfig::default()),
        }
    }

    /// The canonical catalogue with configured overlays and `--catalogue`
    /// layers applied in order.
    pub fn load_registry(&self, config: &TallyConfig) -> Result<Registry> {
        let mut catalogue = Catalogue::canonical().context("canonical catalogue is invalid")?;
        let root = self.project_root()?;

        let overlays = config.catalogue.overlays.iter().map(|p| root.join(p));
        for path in overlays.chain(self.catalogues.iter().cloned()) {
            apply_layer(&mut catalogue, &path)?;
        }

        let registry = Registry::from_catalogue(catalogue)?;
        debug!(version = registry.version(), parameters = registry.len(), "registry loaded");
        Ok(registry)
    }

    /// Layout knobs from the configuration.
    pub fn layout_options(&self, config: &TallyConfig) -> LayoutOptions {
        LayoutOptions {
            horizon_years: config.layout.horizon_years,
            emission_periods: config.layout.emission_periods,
            price_scenario: config.scenarios.price.clone(),
            host_scenario: config.scenarios.host.clone(),
        }
    }
}

fn apply_layer(catalogue: &mut Catalogue, path: &Path) -> Result<()> {
    let layer = load_layer(path).with_context(|| format!("failed to load catalogue layer {}", path.display()))?;
    let version = layer.version.clone();
    catalogue
        .apply(layer)
        .with_context(|| format!("failed to apply catalogue layer {} ({version})", path.display()))?;
    debug!(path = %path.display(), %version, "catalogue layer applied");
    Ok(())
}

/// Parses variant names; an empty list means every variant.
pub fn parse_variants(names: &[String]) -> Result<Vec<DocumentId>> {
    if names.is_empty() {
        return Ok(DocumentId::all());
    }
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id = parse_variant(name)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub fn parse_variant(name: &str) -> Result<DocumentId> {
    name.parse::<DocumentId>()
        .map_err(|e| anyhow::anyhow!("{e} (expected integrated, emission, price, fee, host or treasury)"))
}

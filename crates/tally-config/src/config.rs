//! Configuration types and loading for the tally generator.
//!
//! The main entry point is [`TallyConfig`], which represents the contents of
//! `.tally/config.yaml`. Configuration is loaded with [`load_config`] and
//! saved with [`save_config`].
//!
//! Values are layered with `figment`: built-in defaults, then the YAML
//! file, then `TALLY_`-prefixed environment variables (nested keys joined by
//! `__`, e.g. `TALLY_LAYOUT__HORIZON_YEARS=15`).

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "TALLY_";

/// File name of the configuration inside `.tally/`.
pub const CONFIG_FILE: &str = "config.yaml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration file contained invalid YAML.
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Layered extraction failed (bad type in the file or environment).
    #[error("invalid configuration: {0}")]
    Figment(Box<figment::Error>),

    /// The `.tally/` directory was not found.
    #[error("no .tally directory found (run 'tally init' first)")]
    TallyDirNotFound,

    /// A configuration value was invalid.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Table sizes shared by every document variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Years laid out by the yearly models.
    #[serde(default = "default_horizon_years")]
    pub horizon_years: u32,

    /// Schedule steps laid out by the emission model.
    #[serde(default = "default_emission_periods")]
    pub emission_periods: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizon_years: default_horizon_years(),
            emission_periods: default_emission_periods(),
        }
    }
}

fn default_horizon_years() -> u32 {
    10
}

fn default_emission_periods() -> u32 {
    40
}

/// Initial selector values. Users switch scenarios in the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// `bear`, `base` or `bull` (or 1-3).
    #[serde(default = "default_scenario")]
    pub price: String,

    /// `low`, `base` or `high` (or 1-3).
    #[serde(default = "default_scenario")]
    pub host: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            price: default_scenario(),
            host: default_scenario(),
        }
    }
}

fn default_scenario() -> String {
    "base".to_string()
}

/// Extra catalogue layers applied after the built-in catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CatalogueConfig {
    /// TOML or JSON files, relative to the project root.
    #[serde(default)]
    pub overlays: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Main config struct
// ---------------------------------------------------------------------------

/// The full generator configuration, corresponding to `.tally/config.yaml`.
///
/// All fields use `serde` defaults so that a partially-specified YAML file
/// will be deserialized correctly with sensible default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyConfig {
    /// Where generated files are written, relative to the project root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name of the integrated document.
    #[serde(default = "default_integrated_file")]
    pub integrated_file: String,

    /// File name pattern for standalone documents; `{model}` is replaced.
    #[serde(default = "default_standalone_pattern")]
    pub standalone_pattern: String,

    /// Write a JSON manifest next to every document.
    #[serde(default = "default_true")]
    pub manifest: bool,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub scenarios: ScenarioConfig,

    #[serde(default)]
    pub catalogue: CatalogueConfig,

    /// Variants to generate; empty means all of them.
    #[serde(default)]
    pub variants: Vec<String>,

    /// Generate independent variants on a thread pool.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            integrated_file: default_integrated_file(),
            standalone_pattern: default_standalone_pattern(),
            manifest: true,
            layout: LayoutConfig::default(),
            scenarios: ScenarioConfig::default(),
            catalogue: CatalogueConfig::default(),
            variants: Vec::new(),
            parallel: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_integrated_file() -> String {
    "integrated.xlsx".to_string()
}

fn default_standalone_pattern() -> String {
    "{model}.xlsx".to_string()
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Helper methods on TallyConfig
// ---------------------------------------------------------------------------

impl TallyConfig {
    /// File name for one standalone model document.
    pub fn standalone_file(&self, model: &str) -> String {
        self.standalone_pattern.replace("{model}", model)
    }

    /// Checks values serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.layout.horizon_years == 0 || self.layout.horizon_years > 100 {
            return Err(invalid("layout.horizon_years", "must be between 1 and 100"));
        }
        if self.layout.emission_periods == 0 || self.layout.emission_periods > 1000 {
            return Err(invalid("layout.emission_periods", "must be between 1 and 1000"));
        }
        if !self.standalone_pattern.contains("{model}") {
            return Err(invalid("standalone_pattern", "must contain {model}"));
        }
        if self.integrated_file.trim().is_empty() {
            return Err(invalid("integrated_file", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load configuration from `config.yaml` inside the given `.tally/` directory,
/// with environment overrides applied on top.
///
/// If the file does not exist or is empty, defaults are used.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
/// [`ConfigError::Figment`] if a value has the wrong type, or
/// [`ConfigError::InvalidValue`] if a value is out of range.
pub fn load_config(tally_dir: &Path) -> Result<TallyConfig> {
    let config_path = tally_dir.join(CONFIG_FILE);

    let mut figment = Figment::from(Serialized::defaults(TallyConfig::default()));
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        // An empty file is valid and yields default config.
        if !content.trim().is_empty() {
            figment = figment.merge(Yaml::string(&content));
        }
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: TallyConfig = figment
        .extract()
        .map_err(|e| ConfigError::Figment(Box::new(e)))?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to `config.yaml` inside the given `.tally/` directory.
///
/// The directory is created if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] on I/O failure or [`ConfigError::ParseError`]
/// if serialization fails.
pub fn save_config(tally_dir: &Path, config: &TallyConfig) -> Result<()> {
    std::fs::create_dir_all(tally_dir)?;

    let config_path = tally_dir.join(CONFIG_FILE);
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(config_path, yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

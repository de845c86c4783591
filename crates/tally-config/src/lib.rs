//! Configuration management for the tally workbook generator.
//!
//! This crate handles loading and saving `.tally/config.yaml` files,
//! discovering `.tally/` directories in the filesystem, and providing
//! typed access to generator settings.

pub mod config;
pub mod project_dir;

pub use config::{ConfigError, TallyConfig, load_config, save_config};
pub use project_dir::{ensure_tally_dir, find_tally_dir, find_tally_dir_or_error, project_root};

//! Flag-aware config resolution on top of `rackprobe-config`.
//!
//! `--config` picks the file, `--inventory` overrides where the inventory
//! snapshot lives. Everything else comes from the shared crate.

use std::path::PathBuf;

pub use rackprobe_config::{Config, save_config_to};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file this invocation reads and writes.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(rackprobe_config::config_path)
}

/// Load defaults, the config file (if present) and `RACKPROBE_*` overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(rackprobe_config::load_config_from(&config_file(global))?)
}

pub fn inventory_path(global: &GlobalOpts, cfg: &Config) -> PathBuf {
    global
        .inventory
        .clone()
        .unwrap_or_else(|| cfg.discovery.inventory_path())
}

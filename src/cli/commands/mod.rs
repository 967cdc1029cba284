//! CLI command implementations.

pub mod indicators;
pub mod paper;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;
use trading_config::{load_config, validate_config, AppConfig};

/// Load and validate the configuration, falling back to defaults when the
/// file does not exist.
pub fn load_settings(path: &Path) -> Result<AppConfig> {
    let config = if path.exists() {
        load_config(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        AppConfig::default()
    };

    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

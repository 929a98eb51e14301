//! Configuration loading.

use anyhow::{Context, Result};
use cirrus_core::AppConfig;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;

/// Load configuration from an optional TOML file, then `CIRRUS_*`
/// environment variables (`__` separates sections).
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(path = %path.display(), "loading configuration file");
        figment = figment.merge(Toml::file(path));
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("CIRRUS_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

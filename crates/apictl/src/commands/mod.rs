//! CLI command implementations

pub mod get;
pub mod version;

use anyhow::{Context, Result};
use apictl_core::{HierarchicalConfigLoader, RuntimeConfig};

/// Load runtime config and apply the global `--api-url` flag on top
pub(crate) fn load_config(api_url: Option<&str>) -> Result<RuntimeConfig> {
    let mut config = HierarchicalConfigLoader::new()?
        .load_runtime_config()
        .context("Failed to load runtime configuration")?;

    if let Some(url) = api_url {
        config.update.api_url = url.to_string();
    }
    if !config.display.color_enabled {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    Ok(config)
}

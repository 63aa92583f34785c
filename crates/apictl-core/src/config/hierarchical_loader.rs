//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Runtime config file (~/.apictl/runtime.yaml)
//! 3. Environment variables (APICTL_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::RuntimeConfig;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::Value;
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "runtime-defaults.yaml";
const RUNTIME_FILE: &str = "runtime.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at the standard config directory (~/.apictl)
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    fn default_config_dir() -> Result<Utf8PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Home directory is not UTF-8: {:?}", p)))?;
        Ok(home.join(".apictl"))
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        let mut merged = Self::load_embedded_value(DEFAULTS_FILE)?;

        let runtime_path = self.config_dir.join(RUNTIME_FILE);
        if runtime_path.exists() {
            debug!("Loading runtime config from {}", runtime_path);
            let overlay = Self::load_yaml_value(&runtime_path)?;
            merge_values(&mut merged, overlay);
        }

        let config: RuntimeConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("Failed to parse runtime config: {}", e)))?;

        apply_env_overrides(config)
    }

    fn load_embedded_value(filename: &str) -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    fn load_yaml_value(path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(mut config: RuntimeConfig) -> Result<RuntimeConfig> {
    if let Ok(val) = env::var("APICTL_API_URL") {
        config.update.api_url = val;
    }

    if let Ok(val) = env::var("APICTL_HTTP_TIMEOUT_SECS") {
        config.network.http_timeout_secs = val.parse().map_err(|_| {
            Error::invalid_config("APICTL_HTTP_TIMEOUT_SECS must be a valid number")
        })?;
    }

    if let Ok(val) = env::var("APICTL_DOWNLOAD_TIMEOUT_SECS") {
        config.network.download_timeout_secs = val.parse().map_err(|_| {
            Error::invalid_config("APICTL_DOWNLOAD_TIMEOUT_SECS must be a valid number")
        })?;
    }

    if let Ok(val) = env::var("APICTL_KEEP_BACKUP") {
        config.update.keep_backup = parse_bool("APICTL_KEEP_BACKUP", &val)?;
    }

    if let Ok(val) = env::var("APICTL_VERIFY_SWAP") {
        config.update.verify_swap = parse_bool("APICTL_VERIFY_SWAP", &val)?;
    }

    if let Ok(val) = env::var("APICTL_TRUSTED_PUBLIC_KEY") {
        let val = val.trim();
        config.update.trusted_public_key = (!val.is_empty()).then(|| val.to_string());
    }

    if let Ok(val) = env::var("APICTL_REQUIRE_SIGNATURE") {
        config.update.require_signature = parse_bool("APICTL_REQUIRE_SIGNATURE", &val)?;
    }

    if let Ok(val) = env::var("APICTL_NO_COLOR") {
        config.display.color_enabled = !parse_bool("APICTL_NO_COLOR", &val)?;
    }

    Ok(config)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::invalid_config(format!(
            "{} must be a boolean (true/false)",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RetryStrategy;
    use serial_test::serial;
    use tempfile::TempDir;

    fn create_temp_loader() -> (HierarchicalConfigLoader, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_dir =
            Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("Invalid UTF-8 path");
        let loader = HierarchicalConfigLoader::with_dir(config_dir);
        (loader, temp_dir)
    }

    #[test]
    #[serial]
    fn test_load_runtime_config_defaults() {
        let (loader, _temp) = create_temp_loader();
        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.network.http_timeout_secs, 30);
        assert_eq!(config.update.api_url, "https://api.humanlog.io");
        assert_eq!(config.retry_policies.default.max_attempts, 1);

        let download = config.retry_policies.for_operation("download");
        assert_eq!(download.max_attempts, 1);
        assert_eq!(download.strategy, RetryStrategy::ExponentialBackoff);
    }

    #[test]
    #[serial]
    fn test_download_retry_opt_in_keeps_default_backoff() {
        let (loader, _temp) = create_temp_loader();
        let config_content = r#"
retry-policies:
  operations:
    download:
      max-attempts: 4
"#;
        fs::write(loader.config_dir().join(RUNTIME_FILE), config_content).unwrap();

        let download = loader
            .load_runtime_config()
            .unwrap()
            .retry_policies
            .for_operation("download");
        assert_eq!(download.max_attempts, 4);
        assert_eq!(download.strategy, RetryStrategy::ExponentialBackoff);
        assert_eq!(download.max_delay_ms, 15000);
    }

    #[test]
    #[serial]
    fn test_load_runtime_config_from_file_keeps_unset_defaults() {
        let (loader, _temp) = create_temp_loader();

        let config_content = r#"
network:
  download-timeout-secs: 900
update:
  api-url: "https://updates.example.com"
  keep-backup: true
"#;
        fs::write(loader.config_dir().join(RUNTIME_FILE), config_content).unwrap();

        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.network.download_timeout_secs, 900);
        assert_eq!(config.network.http_timeout_secs, 30);
        assert_eq!(config.update.api_url, "https://updates.example.com");
        assert!(config.update.keep_backup);
        assert!(config.update.verify_swap);
        assert_eq!(config.retry_policies.for_operation("download").max_attempts, 1);
    }

    #[test]
    #[serial]
    fn test_empty_runtime_file_is_ignored() {
        let (loader, _temp) = create_temp_loader();
        fs::write(loader.config_dir().join(RUNTIME_FILE), "\n").unwrap();

        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.update.project_name, "apictl");
    }

    #[test]
    #[serial]
    fn test_invalid_runtime_file() {
        let (loader, _temp) = create_temp_loader();
        fs::write(
            loader.config_dir().join(RUNTIME_FILE),
            "network:\n  http-timeout-secs: soon\n",
        )
        .unwrap();

        let err = loader.load_runtime_config().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("APICTL_API_URL", "http://localhost:8080");
        env::set_var("APICTL_HTTP_TIMEOUT_SECS", "5");
        env::set_var("APICTL_KEEP_BACKUP", "yes");
        env::set_var("APICTL_TRUSTED_PUBLIC_KEY", "  ");
        env::set_var("APICTL_NO_COLOR", "1");

        let config = loader.load_runtime_config().unwrap();
        assert_eq!(config.update.api_url, "http://localhost:8080");
        assert_eq!(config.network.http_timeout_secs, 5);
        assert!(config.update.keep_backup);
        assert!(config.update.trusted_public_key.is_none());
        assert!(!config.display.color_enabled);

        env::remove_var("APICTL_API_URL");
        env::remove_var("APICTL_HTTP_TIMEOUT_SECS");
        env::remove_var("APICTL_KEEP_BACKUP");
        env::remove_var("APICTL_TRUSTED_PUBLIC_KEY");
        env::remove_var("APICTL_NO_COLOR");
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_garbage() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("APICTL_VERIFY_SWAP", "maybe");
        let result = loader.load_runtime_config();
        env::remove_var("APICTL_VERIFY_SWAP");

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_merge_values_is_deep() {
        let mut base: Value =
            serde_yaml_ng::from_str("a:\n  b: 1\n  c: 2\nd: [1, 2]\n").unwrap();
        let overlay: Value = serde_yaml_ng::from_str("a:\n  c: 3\nd: [9]\n").unwrap();

        merge_values(&mut base, overlay);

        let expected: Value = serde_yaml_ng::from_str("a:\n  b: 1\n  c: 3\nd: [9]\n").unwrap();
        assert_eq!(base, expected);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "2").is_err());
    }
}

//! Hierarchical configuration loader with precedence
//!
//! Loads runtime configuration from multiple sources, low to high precedence:
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.zx3dl/runtime.yaml)
//! 3. Environment variables (ZX3DL_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{RetryPoliciesConfig, RuntimeConfig};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::str::FromStr;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const RUNTIME_FILE: &str = "runtime.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at `~/.zx3dl`
    pub fn new() -> Result<Self> {
        let home = crate::utils::get_home_dir()
            .map_err(|e| Error::invalid_config(e.to_string()))?;
        let config_dir = Utf8PathBuf::from_path_buf(home.join(".zx3dl"))
            .map_err(|p| Error::invalid_config(format!("Non UTF-8 home directory: {}", p.display())))?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = Self::load_embedded_config::<RuntimeConfig>("runtime-defaults.yaml")?;

        let runtime_config_path = self.config_dir.join(RUNTIME_FILE);
        if runtime_config_path.exists() {
            let file_config = self.load_yaml_file::<RuntimeConfig>(&runtime_config_path)?;
            config = Self::merge_runtime_config(config, file_config);
        }

        self.apply_env_overrides(config)
    }

    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!("Failed to parse embedded config {}: {}", filename, e))
        })
    }

    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Sections present in the user file replace the embedded ones; retry
    /// operations are merged key by key.
    fn merge_runtime_config(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            network: overlay.network,
            retry_policies: Self::merge_retry_policies(base.retry_policies, overlay.retry_policies),
            catalog: overlay.catalog,
        }
    }

    fn merge_retry_policies(
        mut base: RetryPoliciesConfig,
        overlay: RetryPoliciesConfig,
    ) -> RetryPoliciesConfig {
        for (key, policy) in overlay.operations {
            base.operations.insert(key, policy);
        }
        base.default = overlay.default;
        base
    }

    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        if let Some(val) = parse_env::<u64>("ZX3DL_HTTP_TIMEOUT_SECS")? {
            config.network.http_timeout_secs = val;
        }

        if let Some(val) = parse_env::<u64>("ZX3DL_DOWNLOAD_TIMEOUT_SECS")? {
            config.network.download_timeout_secs = val;
        }

        if let Some(val) = parse_env::<usize>("ZX3DL_MAX_CONCURRENT_DOWNLOADS")? {
            if val == 0 {
                return Err(Error::invalid_config(
                    "ZX3DL_MAX_CONCURRENT_DOWNLOADS must be at least 1",
                ));
            }
            config.network.max_concurrent_downloads = val;
        }

        if let Ok(val) = env::var("ZX3DL_CATALOG_URL") {
            config.catalog.main_url = val;
        }

        if let Ok(val) = env::var("ZX3DL_MRA_TOOL_URL") {
            config.catalog.mra_tool_url = val;
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} must be a valid number", name))),
        Err(_) => Ok(None),
    }
}

//! Runtime configuration types for operational parameters
//!
//! These control network timeouts, download concurrency, retry policies and
//! the catalog endpoints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Retry policy configurations
    #[serde(default)]
    pub retry_policies: RetryPoliciesConfig,

    /// Catalog endpoints
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl RuntimeConfig {
    /// Policy for a named operation, falling back to the default policy
    pub fn retry_policy(&self, operation: &str) -> RetryPolicy {
        self.retry_policies
            .operations
            .get(operation)
            .cloned()
            .unwrap_or_else(|| self.retry_policies.default.clone())
    }
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Timeout for catalog document requests, in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Timeout for a single artifact transfer, in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Connect timeout, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Read buffer used when hashing files
    #[serde(default = "default_chunk_size")]
    pub download_chunk_size: usize,

    /// Upper bound on concurrent item resolutions
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            download_chunk_size: default_chunk_size(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    60
}
fn default_download_timeout() -> u64 {
    600 // 10 minutes
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_chunk_size() -> usize {
    1024 * 1024 // 1 MB
}
fn default_max_concurrent_downloads() -> usize {
    4
}
fn default_user_agent() -> String {
    format!(
        "zx3dl/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Catalog endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// Base URL the main catalog archive is fetched from
    #[serde(default = "default_catalog_url")]
    pub main_url: String,

    /// Name of the main catalog document (served as `<name>.zip`)
    #[serde(default = "default_catalog_name")]
    pub main_name: String,

    /// Base URL of the MRA to ARC converter binaries
    #[serde(default = "default_mra_tool_url")]
    pub mra_tool_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            main_url: default_catalog_url(),
            main_name: default_catalog_name(),
            mra_tool_url: default_mra_tool_url(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://github.com/kounch/ZX3_Downloader/raw/bd/".to_string()
}
fn default_catalog_name() -> String {
    "zx3_main_db.json".to_string()
}
fn default_mra_tool_url() -> String {
    "https://github.com/kounch/mra-tools-c/raw/master/release/".to_string()
}

/// Retry policy configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    /// Default retry policy
    #[serde(default)]
    pub default: RetryPolicy,

    /// Per-operation retry policies (`download`, `metadata`)
    #[serde(default)]
    pub operations: HashMap<String, RetryPolicy>,
}

impl Default for RetryPoliciesConfig {
    fn default() -> Self {
        let mut operations = HashMap::new();

        operations.insert(
            "download".to_string(),
            RetryPolicy {
                max_attempts: 3,
                strategy: RetryStrategy::ExponentialBackoff,
                backoff_multiplier: 2.0,
                initial_delay_ms: 1000,
                max_delay_ms: 30000,
            },
        );
        operations.insert(
            "metadata".to_string(),
            RetryPolicy {
                max_attempts: 3,
                strategy: RetryStrategy::ExponentialBackoff,
                backoff_multiplier: 2.0,
                initial_delay_ms: 500,
                max_delay_ms: 10000,
            },
        );

        Self {
            default: RetryPolicy::default(),
            operations,
        }
    }
}

/// Retry policy for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, for tests and local files
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            strategy: RetryStrategy::None,
            backoff_multiplier: 1.0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

/// Delay strategy between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Retry immediately
    None,

    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,

    LinearBackoff,
}

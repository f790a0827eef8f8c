use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for cdrd
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Store backend settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Store backend selection
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Fjall,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend type
    #[serde(default)]
    pub backend: StoreBackend,

    /// Data directory for the persistent backend
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl StoreConfig {
    /// In-memory store, for development and tests.
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: default_store_path(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::memory()
    }
}

/// Resolution settings
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Default window length when `resolve` is given no end time
    #[serde(default = "default_window", with = "humantime_serde")]
    pub window: Duration,

    /// How often the daemon resolves the trailing window
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            interval: default_interval(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g. "info", "cdrd=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON-formatted logs
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_window() -> Duration {
    // spec: end_time defaults to one day after start_time
    Duration::from_secs(24 * 60 * 60)
}

fn default_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_log_level() -> String {
    "info".to_string()
}

//! Configuration loading for the monitor.
//!
//! Configuration is loaded with `figment` from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `FILMON_` (override), with `__`
//!    separating nesting levels, e.g. `FILMON_SCANNER__SCAN_INTERVAL_SECS=60`
//!
//! After loading, [`MonitorConfig::validate`] checks the semantic constraints
//! that parsing alone cannot: a recognized log level, non-zero scan depth and
//! interval, non-empty beam prefixes and key namespace.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Application settings.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Directory scanning and extraction settings.
    pub scanner: ScannerConfig,
    /// Shared key-value store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name, used in startup logging.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

/// Directory scanning and statistics extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Root of the beamformer output tree.
    pub root_directory: PathBuf,
    /// Recording directories sit this many levels below the root.
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,
    /// Seconds between scan cycles.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Subdirectory name prefix for coherent-beam recordings.
    #[serde(default = "default_coherent_prefix")]
    pub coherent_prefix: String,
    /// Subdirectory name prefix for incoherent-beam recordings.
    #[serde(default = "default_incoherent_prefix")]
    pub incoherent_prefix: String,
    /// File extension of candidate filterbank files.
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Spectra read per chunk while accumulating statistics.
    #[serde(default = "default_chunk_spectra")]
    pub chunk_spectra: usize,
}

impl ScannerConfig {
    /// The inter-cycle sleep as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

/// Shared key-value store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store connection URL.
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Prefix for every published key.
    #[serde(default = "default_key_namespace")]
    pub key_namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            key_namespace: default_key_namespace(),
        }
    }
}

// Default value functions

fn default_app_name() -> String {
    "filterbank-monitor".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scan_depth() -> usize {
    3
}

fn default_scan_interval() -> u64 {
    300
}

fn default_coherent_prefix() -> String {
    "cfbf".to_string()
}

fn default_incoherent_prefix() -> String {
    "ifbf".to_string()
}

fn default_file_extension() -> String {
    "fil".to_string()
}

fn default_chunk_spectra() -> usize {
    10_000
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_namespace() -> String {
    "filterbank-directory-monitor".to_string()
}

impl MonitorConfig {
    /// Load configuration from a TOML file and `FILMON_` environment
    /// variables, environment taking precedence.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("FILMON_").split("__"))
            .extract()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.scanner.root_directory.as_os_str().is_empty() {
            return Err("scanner.root_directory must not be empty".to_string());
        }

        if self.scanner.scan_depth == 0 {
            return Err("scanner.scan_depth must be at least 1".to_string());
        }

        if self.scanner.scan_interval_secs == 0 {
            return Err("scanner.scan_interval_secs must be at least 1".to_string());
        }

        if self.scanner.chunk_spectra == 0 {
            return Err("scanner.chunk_spectra must be at least 1".to_string());
        }

        if self.scanner.coherent_prefix.is_empty() || self.scanner.incoherent_prefix.is_empty() {
            return Err("beam directory prefixes must not be empty".to_string());
        }

        if self.store.key_namespace.is_empty() {
            return Err("store.key_namespace must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> MonitorConfig {
        MonitorConfig {
            application: ApplicationConfig::default(),
            scanner: ScannerConfig {
                root_directory: PathBuf::from("/data/recordings"),
                scan_depth: default_scan_depth(),
                scan_interval_secs: default_scan_interval(),
                coherent_prefix: default_coherent_prefix(),
                incoherent_prefix: default_incoherent_prefix(),
                file_extension: default_file_extension(),
                chunk_spectra: default_chunk_spectra(),
            },
            store: StoreConfig::default(),
        }
    }

    #[test]
    fn defaults_pass_validation() {
        let config = minimal_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.scanner.scan_interval_secs, 300);
        assert_eq!(config.store.key_namespace, "filterbank-directory-monitor");
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let config: MonitorConfig = Figment::new()
            .merge(Toml::string(
                r#"
                [scanner]
                root_directory = "/beegfs/DATA/TRAPUM"
                "#,
            ))
            .extract()
            .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.scanner.coherent_prefix, "cfbf");
        assert_eq!(config.scanner.incoherent_prefix, "ifbf");
        assert_eq!(config.scanner.scan_depth, 3);
        assert_eq!(config.application.log_level, "info");
    }

    #[test]
    fn invalid_log_level_rejected() {
        let mut config = minimal_config();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = minimal_config();
        config.scanner.scan_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_namespace_rejected() {
        let mut config = minimal_config();
        config.store.key_namespace = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn interval_converts_to_duration() {
        let mut config = minimal_config();
        config.scanner.scan_interval_secs = 60;
        assert_eq!(config.scanner.interval(), Duration::from_secs(60));
    }
}

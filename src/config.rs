//! Configuration module for the sqlsweep scanner

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default MySQL port
pub const DEFAULT_PORT: u16 = 3306;

/// Largest accepted connect or read timeout, in seconds (one day)
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// Largest accepted greeting read buffer, in bytes
pub const MAX_READ_BUDGET: usize = 4096;

/// Main configuration structure for scanning operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Target network in CIDR notation
    pub target: String,

    /// TCP port probed on every host
    pub port: u16,

    /// Connect timeout in seconds
    pub connect_timeout: f64,

    /// Handshake read timeout in seconds
    pub read_timeout: f64,

    /// Maximum number of probes in flight at once
    pub concurrency: usize,

    /// Upper bound on the number of hosts a single run may expand to
    pub max_hosts: usize,

    /// Bytes read while waiting for the handshake
    pub read_budget: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: "127.0.0.1/24".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: 4.0,
            read_timeout: 3.0,
            concurrency: 50,
            max_hosts: 65_536,
            read_budget: 64,
        }
    }
}

impl ScanConfig {
    /// Create a new scan configuration
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Set the port to probe
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connect timeout in seconds
    pub fn with_connect_timeout(mut self, secs: f64) -> Self {
        self.connect_timeout = secs;
        self
    }

    /// Set the read timeout in seconds
    pub fn with_read_timeout(mut self, secs: f64) -> Self {
        self.read_timeout = secs;
        self
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the host-count guard
    pub fn with_max_hosts(mut self, max_hosts: usize) -> Self {
        self.max_hosts = max_hosts;
        self
    }

    /// Get the connect timeout as Duration
    pub fn connect_timeout_duration(&self) -> Duration {
        secs_to_duration(self.connect_timeout)
    }

    /// Get the read timeout as Duration
    pub fn read_timeout_duration(&self) -> Duration {
        secs_to_duration(self.read_timeout)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::ScanError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: ScanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Location of the per-user config file
    pub fn default_config_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".sqlsweep.toml")
    }

    /// Load configuration from default locations
    pub fn load_default_config() -> Self {
        let path = Self::default_config_path();

        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.trim().is_empty() {
            return Err(crate::ScanError::InvalidRange("Target cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(crate::ScanError::ConfigError("Port must be between 1 and 65535".to_string()));
        }

        if self.concurrency == 0 {
            return Err(crate::ScanError::ConfigError(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("read_timeout", self.read_timeout),
        ] {
            if !value.is_finite() || value <= 0.0 || value > MAX_TIMEOUT_SECS {
                return Err(crate::ScanError::ConfigError(format!(
                    "{} must be between 0 and {} seconds, got {}",
                    name, MAX_TIMEOUT_SECS, value
                )));
            }
        }

        // the marker sits at offset 4
        if !(5..=MAX_READ_BUDGET).contains(&self.read_budget) {
            return Err(crate::ScanError::ConfigError(format!(
                "read_budget must be between 5 and {} bytes, got {}",
                MAX_READ_BUDGET, self.read_budget
            )));
        }

        if self.max_hosts == 0 {
            return Err(crate::ScanError::ConfigError(
                "max_hosts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Out-of-range values saturate instead of panicking; `validate` rejects them first.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

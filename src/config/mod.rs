//! Process settings
//!
//! A single [`Settings`] value is built at startup from defaults, an optional
//! YAML file and command-line overrides, then passed by reference to every
//! component that needs it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::AddressError;

/// Default deadline for a control-plane state fetch
pub const DEFAULT_STATE_TIMEOUT_SECS: u64 = 10;

/// Port the framework worker service listens on
pub const DEFAULT_WORKER_PORT: u16 = 9311;

/// Default working prefix; each framework run appends a fresh id
pub const DEFAULT_PREFIX: &str = "/tmp/exelixi/";

/// Default config file location: ~/.exelixi/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".exelixi")
        .join("config.yaml")
}

/// Errors for loading and validating settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid setting '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Unknown feature factory '{0}'")]
    UnknownFeature(String),

    #[error("Invalid address for {flag}: {source}")]
    InvalidAddress {
        flag: &'static str,
        #[source]
        source: AddressError,
    },
}

/// Settings shared by every role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Deadline in seconds for each control-plane state fetch
    #[serde(default = "default_state_timeout_secs")]
    pub state_timeout_secs: u64,

    /// Port of the worker service on every slave
    #[serde(default = "default_worker_port")]
    pub worker_port: u16,

    /// Bind address for the worker service
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Working prefix for framework runs
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Executable handed to the scheduler (defaults to the running binary)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_timeout_secs: DEFAULT_STATE_TIMEOUT_SECS,
            worker_port: DEFAULT_WORKER_PORT,
            bind_addr: default_bind_addr(),
            prefix: default_prefix(),
            executable: None,
        }
    }
}

fn default_state_timeout_secs() -> u64 {
    DEFAULT_STATE_TIMEOUT_SECS
}

fn default_worker_port() -> u16 {
    DEFAULT_WORKER_PORT
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Settings {
    pub fn state_timeout(&self) -> Duration {
        Duration::from_secs(self.state_timeout_secs)
    }

    /// Apply command-line overrides on top of file settings
    pub fn with_overrides(mut self, timeout_secs: Option<u64>, bind_addr: Option<&str>) -> Self {
        if let Some(secs) = timeout_secs {
            self.state_timeout_secs = secs;
        }
        if let Some(addr) = bind_addr {
            self.bind_addr = addr.to_string();
        }
        self
    }

    /// Path of the executable that executors should run
    pub fn executable_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.executable {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_exe()?),
        }
    }

    /// Reject settings that cannot work at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "state-timeout-secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.worker_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker-port",
                reason: "must be a non-zero port".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse settings from a YAML string
pub fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load settings from `path`, or from the default location when `None`.
///
/// An explicitly named file must exist; a missing default file just yields
/// the built-in defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path(), false),
    };

    if !path.exists() {
        return if explicit {
            Err(ConfigError::ConfigNotFound(path))
        } else {
            Ok(Settings::default())
        };
    }

    let content = std::fs::read_to_string(&path)?;
    parse_settings(&content)
}

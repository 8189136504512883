//! Cluster addresses and process identifiers
//!
//! The control plane reports processes as `id@host:port` identifiers. This
//! module holds the value types for those addresses and the pure parsing
//! logic used by leader resolution and slave enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for malformed `host:port` and `id@host:port` tokens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("'{0}' is not of the form id@host:port (missing '@')")]
    MissingSeparator(String),

    #[error("'{0}' is not of the form host:port (missing ':')")]
    MissingPort(String),

    #[error("'{0}' has an empty host")]
    EmptyHost(String),

    #[error("'{0}' has an invalid port")]
    InvalidPort(String),
}

/// A `(host, port)` pair, written as `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusterAddress {
    host: String,
    port: u16,
}

impl ClusterAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for HTTP requests against this address
    pub fn base_url(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for ClusterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ClusterAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;

        if host.is_empty() {
            return Err(AddressError::EmptyHost(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;

        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for ClusterAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClusterAddress> for String {
    fn from(addr: ClusterAddress) -> Self {
        addr.to_string()
    }
}

/// A worker host registered with the control plane.
///
/// Only the host is kept: workers listen on the framework's own port, not
/// the one the control plane reports for the slave process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlaveEntry {
    pub host: String,
}

impl SlaveEntry {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Address of the framework worker service on this host
    pub fn worker_address(&self, worker_port: u16) -> ClusterAddress {
        ClusterAddress::new(self.host.clone(), worker_port)
    }
}

impl fmt::Display for SlaveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

// ============================================================================
// SBIO: Pure parsing (no I/O)
// ============================================================================

/// Extract the address embedded in an `id@host:port` process identifier.
///
/// Splits on the last `@`, so identifiers whose id part itself contains `@`
/// still resolve to the trailing address.
pub fn parse_pid(pid: &str) -> Result<ClusterAddress, AddressError> {
    let (_, addr) = pid
        .rsplit_once('@')
        .ok_or_else(|| AddressError::MissingSeparator(pid.to_string()))?;
    addr.parse()
}

/// Extract the slave host from an `id@host:port` identifier, dropping the port
pub fn parse_slave_pid(pid: &str) -> Result<SlaveEntry, AddressError> {
    parse_pid(pid).map(|addr| SlaveEntry::new(addr.host))
}

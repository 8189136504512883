//! Host telemetry for worker services
//!
//! Collects a snapshot of the slave's resources (memory, CPU,
//! disk under the temp directory, network totals) for the worker service's
//! info endpoint.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Networks, System};

/// Resource snapshot of one host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Telemetry {
    pub hostname: String,
    pub collected_at: DateTime<Utc>,
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
    pub cpu_num: usize,
    pub cpu_usage_percent: f64,
    pub load_average: LoadAverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_usage: Option<DiskUsage>,
    pub network_io: NetworkIo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// Usage of the filesystem holding the working directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiskUsage {
    pub mount_point: PathBuf,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NetworkIo {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
}

/// Mount point, total bytes and available bytes of one disk
pub type DiskSpace = (PathBuf, u64, u64);

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Pick the disk whose mount point is the longest prefix of `path`
pub fn usage_for_path(disks: &[DiskSpace], path: &Path) -> Option<DiskUsage> {
    disks
        .iter()
        .filter(|(mount, _, _)| path.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.components().count())
        .map(|(mount, total, available)| {
            let percent = if *total > 0 {
                (total.saturating_sub(*available) as f64 / *total as f64) * 100.0
            } else {
                0.0
            };
            DiskUsage {
                mount_point: mount.clone(),
                free: *available,
                percent,
            }
        })
}

// ============================================================================
// I/O boundary
// ============================================================================

/// Host telemetry collector
///
/// Keeps its `sysinfo` handles between samples so CPU usage covers the time
/// since the previous sample rather than since boot.
pub struct TelemetryCollector {
    system: System,
    disks: Disks,
    networks: Networks,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }

    /// Refresh and return a snapshot of this host
    pub fn collect(&mut self) -> Telemetry {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.disks.refresh(true);
        self.networks.refresh(true);

        let spaces: Vec<DiskSpace> = self
            .disks
            .iter()
            .map(|d| {
                (
                    d.mount_point().to_path_buf(),
                    d.total_space(),
                    d.available_space(),
                )
            })
            .collect();

        let network_io = self
            .networks
            .iter()
            .fold(NetworkIo::default(), |acc, (_, data)| NetworkIo {
                bytes_sent: acc.bytes_sent + data.total_transmitted(),
                bytes_recv: acc.bytes_recv + data.total_received(),
                packets_sent: acc.packets_sent + data.total_packets_transmitted(),
                packets_recv: acc.packets_recv + data.total_packets_received(),
                errin: acc.errin + data.total_errors_on_received(),
                errout: acc.errout + data.total_errors_on_transmitted(),
            });

        let load = System::load_average();

        Telemetry {
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            collected_at: Utc::now(),
            mem_total: self.system.total_memory(),
            mem_free: self.system.free_memory(),
            mem_available: self.system.available_memory(),
            cpu_num: self.system.cpus().len(),
            cpu_usage_percent: self.system.global_cpu_usage() as f64,
            load_average: LoadAverage {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
            disk_usage: usage_for_path(&spaces, &std::env::temp_dir()),
            network_io,
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

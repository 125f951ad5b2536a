//! Process and disk metrics
//!
//! Condition checkers read live usage through [`MetricsProvider`]. The
//! default [`SystemMetrics`] is backed by `sysinfo`; its calls block, so the
//! inspector runs them on the blocking pool.

use std::ffi::OsStr;
use std::path::Path;
use std::thread;
use sysinfo::{Disks, ProcessesToUpdate, System};
use thiserror::Error;

/// Metrics lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Process '{0}' is not running")]
    ProcessNotFound(String),

    #[error("No disk found for path {0}")]
    DiskNotFound(String),

    #[error("Metrics unavailable: {0}")]
    Unavailable(String),
}

/// Source of live resource usage
pub trait MetricsProvider: Send + Sync {
    /// CPU usage of the named process, in percent
    fn process_cpu_percent(&self, process: &str) -> Result<f64, MetricsError>;

    /// Resident memory of the named process, in MB
    fn process_memory_mb(&self, process: &str) -> Result<u64, MetricsError>;

    /// Free space of the disk holding `path`, in GB
    fn disk_free_gb(&self, path: &Path) -> Result<u64, MetricsError>;
}

/// Metrics read from the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMetrics;

impl SystemMetrics {
    pub fn new() -> Self {
        SystemMetrics
    }

    fn refreshed(samples: u32) -> System {
        let mut system = System::new();
        for i in 0..samples {
            if i > 0 {
                // CPU usage is the delta between two refreshes
                thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
            system.refresh_processes(ProcessesToUpdate::All, true);
        }
        system
    }
}

impl MetricsProvider for SystemMetrics {
    fn process_cpu_percent(&self, process: &str) -> Result<f64, MetricsError> {
        let system = Self::refreshed(2);
        let found = system
            .processes_by_exact_name(OsStr::new(process))
            .next()
            .ok_or_else(|| MetricsError::ProcessNotFound(process.to_string()))?;
        Ok(f64::from(found.cpu_usage()))
    }

    fn process_memory_mb(&self, process: &str) -> Result<u64, MetricsError> {
        let system = Self::refreshed(1);
        let found = system
            .processes_by_exact_name(OsStr::new(process))
            .next()
            .ok_or_else(|| MetricsError::ProcessNotFound(process.to_string()))?;
        Ok(found.memory() >> 20)
    }

    fn disk_free_gb(&self, path: &Path) -> Result<u64, MetricsError> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| MetricsError::DiskNotFound(path.display().to_string()))?;
        Ok(disk.available_space() >> 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_process_is_an_error() {
        let metrics = SystemMetrics::new();
        let result = metrics.process_memory_mb("no-such-process-delegator-test");
        assert_eq!(
            result,
            Err(MetricsError::ProcessNotFound(
                "no-such-process-delegator-test".to_string()
            ))
        );
    }

    #[test]
    fn test_error_display() {
        let err = MetricsError::DiskNotFound("/data".to_string());
        assert_eq!(err.to_string(), "No disk found for path /data");
    }
}

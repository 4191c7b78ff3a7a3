//! Disk counter sources
//!
//! The sampling engine only sees the [`DiskStatsSource`] trait. Platform
//! implementations live behind it:
//! - Linux: sysfs (`/sys/block/<dev>/stat`)
//! - Scripted: in-memory frames for tests and dry runs

pub mod fake;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod linux;

// Re-export commonly used types
pub use fake::ScriptedSource;
pub use traits::{Capabilities, DiskStatsSource, RawDiskCounters};

use crate::error::Result;
use std::sync::Arc;

impl<T: DiskStatsSource + ?Sized> DiskStatsSource for Arc<T> {
    fn list_disks(&self) -> Result<Vec<String>> {
        (**self).list_disks()
    }

    fn query_disk(&self, name: &str) -> Result<Option<RawDiskCounters>> {
        (**self).query_disk(name)
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn io_accounting(&self) -> Result<bool> {
        (**self).io_accounting()
    }

    fn set_io_accounting(&self, enabled: bool) -> Result<()> {
        (**self).set_io_accounting(enabled)
    }
}

/// The counter source for the running platform
pub fn platform_source() -> Result<Box<dyn DiskStatsSource>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::LinuxDiskSource::new()))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(crate::error::Error::UnsupportedPlatform(
            "Disk counters not supported on this platform".to_string(),
        ))
    }
}

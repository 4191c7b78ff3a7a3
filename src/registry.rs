//! Device registry: the fixed set of disks discovered at startup

use crate::config::Config;
use crate::disk::DiskStatsSource;
use crate::error::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// One disk and its sampling control state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device name as reported by the OS
    pub name: String,
    /// Disabled devices always report the unavailable sentinel
    pub enabled: bool,
    /// Minimum seconds between OS queries
    pub threshold: f64,
    /// Seconds since boot of the last sample
    pub last_sample_time: f64,
}

impl Device {
    pub fn new(name: impl Into<String>, threshold: f64) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            threshold,
            last_sample_time: 0.0,
        }
    }

    /// Seconds since the last sample
    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.last_sample_time
    }

    /// Whether enough time has passed to query the OS again
    pub fn is_due(&self, now: f64) -> bool {
        self.elapsed(now) > self.threshold
    }
}

/// Enumerate the disks reported by `source`, in enumeration order
///
/// A failing or empty enumeration yields no devices. Only a failure to
/// allocate the device table is an error.
pub fn discover(source: &dyn DiskStatsSource, config: &Config) -> Result<Vec<Device>> {
    let names = match source.list_disks() {
        Ok(names) => names,
        Err(e) => {
            warn!("Disk enumeration failed, no devices will be sampled: {}", e);
            return Ok(Vec::new());
        }
    };

    if names.is_empty() {
        warn!("No disk devices found");
        return Ok(Vec::new());
    }

    let mut devices = Vec::new();
    devices.try_reserve_exact(names.len())?;

    for name in names {
        if devices.iter().any(|d: &Device| d.name == name) {
            warn!("Skipping duplicate disk name {}", name);
            continue;
        }

        let mut device = Device::new(name.as_str(), config.threshold_for(&name));
        device.enabled = config.is_enabled(&name);
        if !device.enabled {
            info!("Disk {} disabled by configuration", name);
        }
        devices.push(device);
    }

    info!(
        "Discovered {} disk(s): {}",
        devices.len(),
        devices
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(devices)
}

//! Time sources for the sampling engine
//!
//! Sample timestamps are seconds since boot as `f64`.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Source of "now", in seconds since boot
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock measured from the host's boot time
///
/// The boot timestamp is read once. When it cannot be determined the clock
/// counts from its own creation instead.
#[derive(Debug, Clone)]
pub struct BootClock {
    boot: DateTime<Utc>,
}

impl BootClock {
    pub fn new() -> Self {
        Self {
            boot: read_boot_timestamp().unwrap_or_else(Utc::now),
        }
    }

    /// A clock counting from the given boot timestamp
    pub fn with_boot_time(boot: DateTime<Utc>) -> Self {
        Self { boot }
    }

    pub fn boot_time(&self) -> DateTime<Utc> {
        self.boot
    }
}

impl Default for BootClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BootClock {
    fn now(&self) -> f64 {
        let since_boot = Utc::now() - self.boot;
        match since_boot.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => since_boot.num_milliseconds() as f64 / 1_000.0,
        }
    }
}

#[cfg(target_os = "linux")]
fn read_boot_timestamp() -> Option<DateTime<Utc>> {
    let content = std::fs::read_to_string("/proc/uptime").ok()?;
    parse_boot_timestamp(&content, Utc::now())
}

#[cfg(not(target_os = "linux"))]
fn read_boot_timestamp() -> Option<DateTime<Utc>> {
    None
}

/// Boot timestamp from /proc/uptime content (`<uptime secs> <idle secs>`)
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_boot_timestamp(uptime: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs: f64 = uptime.split_whitespace().next()?.parse().ok()?;
    let uptime = chrono::Duration::from_std(std::time::Duration::from_secs_f64(secs)).ok()?;
    Some(now - uptime)
}

/// Manually advanced clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `secs`
    pub fn advance(&self, secs: f64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += secs;
    }

    pub fn set(&self, secs: f64) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

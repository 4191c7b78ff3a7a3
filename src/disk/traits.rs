//! Unified traits and types for disk counter sources

use crate::error::{Error, Result};
use crate::metric::MetricKind;
use serde::{Deserialize, Serialize};

/// Disk counter source - the OS boundary of the sampling engine
///
/// Implementations wrap whatever the platform offers for per-disk counters.
/// `list_disks` is called once at startup, `query_disk` once per sample.
pub trait DiskStatsSource: Send + Sync {
    /// Enumerate all disk devices, in the order the OS reports them
    fn list_disks(&self) -> Result<Vec<String>>;

    /// Query the raw counters of one named device
    ///
    /// `Ok(None)` means the OS returned no data for the device.
    fn query_disk(&self, name: &str) -> Result<Option<RawDiskCounters>>;

    /// Platform capabilities, read once at startup
    fn capabilities(&self) -> Capabilities;

    /// Whether system-wide disk I/O accounting is currently enabled
    fn io_accounting(&self) -> Result<bool> {
        Err(Error::UnsupportedPlatform(
            "I/O accounting control not available".to_string(),
        ))
    }

    /// Enable or disable system-wide disk I/O accounting
    fn set_io_accounting(&self, _enabled: bool) -> Result<()> {
        Err(Error::UnsupportedPlatform(
            "I/O accounting control not available".to_string(),
        ))
    }
}

/// Platform capabilities and conversion constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Service-time and wait-queue counters are reported
    pub extended: bool,
    /// Hardware ticks to nanoseconds ratio; `ticks * tick_ratio / 1e6` gives milliseconds
    pub tick_ratio: f64,
    /// Number of CPUs, used to normalize sampled queue depth
    pub cpu_count: usize,
}

impl Capabilities {
    /// Basic counters only
    pub fn basic() -> Self {
        Self {
            extended: false,
            tick_ratio: 1.0,
            cpu_count: 1,
        }
    }

    /// Convert a hardware tick count to milliseconds
    pub fn ticks_to_ms(&self, ticks: f64) -> f64 {
        ticks * self.tick_ratio / 1_000_000.0
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::basic()
    }
}

/// Raw counters for one disk as reported by the OS
///
/// Cumulative fields only ever grow between samples unless the counter
/// wraps or the device is reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDiskCounters {
    /// Total size in MiB
    pub size: u64,
    /// Free (unallocated) size in MiB
    pub free: u64,
    /// Block size in bytes; `rblks`/`wblks` are counted in this unit
    pub bsize: u64,
    /// Transfer rate field in KiB/s
    ///
    /// Also the divisor of the read service time. Platforms that keep read
    /// transfer counts in this slot report them here.
    pub xrate: u64,
    /// Cumulative transfers to/from the disk
    pub xfers: u64,
    /// Cumulative blocks written
    pub wblks: u64,
    /// Cumulative blocks read
    pub rblks: u64,
    /// Instantaneous service queue depth
    pub qdepth: u64,
    /// Cumulative active time in 1/100 s ticks
    pub time: u64,

    /// Cumulative service-queue-full occurrences
    pub q_full: u64,
    /// Cumulative read service time (hardware ticks)
    pub rserv: u64,
    /// Read request timeouts
    pub rtimeout: u64,
    /// Failed read requests
    pub rfailed: u64,
    /// Minimum read service time (hardware ticks)
    pub min_rserv: u64,
    /// Maximum read service time (hardware ticks)
    pub max_rserv: u64,
    /// Cumulative write service time (hardware ticks)
    pub wserv: u64,
    /// Write request timeouts
    pub wtimeout: u64,
    /// Failed write requests
    pub wfailed: u64,
    /// Minimum write service time (hardware ticks)
    pub min_wserv: u64,
    /// Maximum write service time (hardware ticks)
    pub max_wserv: u64,
    /// Instantaneous wait queue depth
    pub wq_depth: u64,
    /// Cumulative sampled wait queue depth
    pub wq_sampled: u64,
    /// Cumulative wait queueing time (hardware ticks)
    pub wq_time: u64,
    /// Minimum wait queueing time (hardware ticks)
    pub wq_min_time: u64,
    /// Maximum wait queueing time (hardware ticks)
    pub wq_max_time: u64,
}

impl RawDiskCounters {
    /// The raw field a metric kind is computed from
    pub fn value(&self, kind: MetricKind) -> u64 {
        match kind {
            MetricKind::Size => self.size,
            MetricKind::Free => self.free,
            MetricKind::Bsize => self.bsize,
            MetricKind::Xrate => self.xrate,
            MetricKind::Xfers => self.xfers,
            MetricKind::Wbytes => self.wblks,
            MetricKind::Rbytes => self.rblks,
            MetricKind::Qdepth => self.qdepth,
            MetricKind::Time => self.time,
            MetricKind::QFull => self.q_full,
            MetricKind::Rserv => self.rserv,
            MetricKind::Rtimeout => self.rtimeout,
            MetricKind::Rfailed => self.rfailed,
            MetricKind::MinRserv => self.min_rserv,
            MetricKind::MaxRserv => self.max_rserv,
            MetricKind::Wserv => self.wserv,
            MetricKind::Wtimeout => self.wtimeout,
            MetricKind::Wfailed => self.wfailed,
            MetricKind::MinWserv => self.min_wserv,
            MetricKind::MaxWserv => self.max_wserv,
            MetricKind::WqDepth => self.wq_depth,
            MetricKind::WqSampled => self.wq_sampled,
            MetricKind::WqTime => self.wq_time,
            MetricKind::WqMinTime => self.wq_min_time,
            MetricKind::WqMaxTime => self.wq_max_time,
        }
    }
}

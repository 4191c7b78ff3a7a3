//! Metric kinds and collector-facing descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a metric's value is derived from raw counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Conversion {
    /// Raw value, optionally unit-scaled
    Gauge,
    /// Counter delta divided by elapsed seconds
    Rate,
    /// Counter delta within the interval, not normalized by time
    Delta,
    /// Tick delta converted to milliseconds and divided by a companion delta
    ServiceTime,
}

/// Every per-device metric the engine exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Size,
    Free,
    Bsize,
    Xrate,
    Xfers,
    Wbytes,
    Rbytes,
    Qdepth,
    Time,
    QFull,
    Rserv,
    Rtimeout,
    Rfailed,
    MinRserv,
    MaxRserv,
    Wserv,
    Wtimeout,
    Wfailed,
    MinWserv,
    MaxWserv,
    WqDepth,
    WqSampled,
    WqTime,
    WqMinTime,
    WqMaxTime,
}

impl MetricKind {
    /// Number of metric kinds
    pub const COUNT: usize = 25;

    /// All kinds in registration order
    pub const ALL: [MetricKind; Self::COUNT] = [
        MetricKind::Size,
        MetricKind::Free,
        MetricKind::Bsize,
        MetricKind::Xrate,
        MetricKind::Xfers,
        MetricKind::Wbytes,
        MetricKind::Rbytes,
        MetricKind::Qdepth,
        MetricKind::Time,
        MetricKind::QFull,
        MetricKind::Rserv,
        MetricKind::Rtimeout,
        MetricKind::Rfailed,
        MetricKind::MinRserv,
        MetricKind::MaxRserv,
        MetricKind::Wserv,
        MetricKind::Wtimeout,
        MetricKind::Wfailed,
        MetricKind::MinWserv,
        MetricKind::MaxWserv,
        MetricKind::WqDepth,
        MetricKind::WqSampled,
        MetricKind::WqTime,
        MetricKind::WqMinTime,
        MetricKind::WqMaxTime,
    ];

    /// Position in [`MetricKind::ALL`], used to index per-device storage
    pub fn index(self) -> usize {
        self as usize
    }

    /// Metric name as it appears in identifiers
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Size => "size",
            MetricKind::Free => "free",
            MetricKind::Bsize => "bsize",
            MetricKind::Xrate => "xrate",
            MetricKind::Xfers => "xfers",
            MetricKind::Wbytes => "wbytes",
            MetricKind::Rbytes => "rbytes",
            MetricKind::Qdepth => "qdepth",
            MetricKind::Time => "time",
            MetricKind::QFull => "q_full",
            MetricKind::Rserv => "rserv",
            MetricKind::Rtimeout => "rtimeout",
            MetricKind::Rfailed => "rfailed",
            MetricKind::MinRserv => "min_rserv",
            MetricKind::MaxRserv => "max_rserv",
            MetricKind::Wserv => "wserv",
            MetricKind::Wtimeout => "wtimeout",
            MetricKind::Wfailed => "wfailed",
            MetricKind::MinWserv => "min_wserv",
            MetricKind::MaxWserv => "max_wserv",
            MetricKind::WqDepth => "wq_depth",
            MetricKind::WqSampled => "wq_sampled",
            MetricKind::WqTime => "wq_time",
            MetricKind::WqMinTime => "wq_min_time",
            MetricKind::WqMaxTime => "wq_max_time",
        }
    }

    /// Human-readable description, prefixed with the device name when registered
    pub fn description(self) -> &'static str {
        match self {
            MetricKind::Size => "total disk size",
            MetricKind::Free => "free disk size",
            MetricKind::Bsize => "block size",
            MetricKind::Xrate => "transfer rate capability",
            MetricKind::Xfers => "number of transfers to/from disk",
            MetricKind::Wbytes => "number of bytes written to disk",
            MetricKind::Rbytes => "number of bytes read from disk",
            MetricKind::Qdepth => "instantaneous service queue depth",
            MetricKind::Time => "percentage of time disk is active",
            MetricKind::QFull => "service queue full occurrence count",
            MetricKind::Rserv => "read or receive service time",
            MetricKind::Rtimeout => "number of read request timeouts",
            MetricKind::Rfailed => "number of failed read requests",
            MetricKind::MinRserv => "minimum read or receive service time",
            MetricKind::MaxRserv => "maximum read or receive service time",
            MetricKind::Wserv => "write or send service time",
            MetricKind::Wtimeout => "number of write request timeouts",
            MetricKind::Wfailed => "number of failed write requests",
            MetricKind::MinWserv => "minimum write or send service time",
            MetricKind::MaxWserv => "maximum write or send service time",
            MetricKind::WqDepth => "instantaneous wait queue depth",
            MetricKind::WqSampled => "accumulated sampled wait queue depth",
            MetricKind::WqTime => "accumulated wait queueing time",
            MetricKind::WqMinTime => "minimum wait queueing time",
            MetricKind::WqMaxTime => "maximum wait queueing time",
        }
    }

    /// Display units
    pub fn units(self) -> &'static str {
        match self {
            MetricKind::Size | MetricKind::Free | MetricKind::Bsize => "bytes",
            MetricKind::Xrate | MetricKind::Wbytes | MetricKind::Rbytes => "bytes/sec",
            MetricKind::Xfers => "transfers/sec",
            MetricKind::Time => "percent",
            MetricKind::Rserv
            | MetricKind::MinRserv
            | MetricKind::MaxRserv
            | MetricKind::Wserv
            | MetricKind::MinWserv
            | MetricKind::MaxWserv
            | MetricKind::WqTime
            | MetricKind::WqMinTime
            | MetricKind::WqMaxTime => "ms",
            _ => "",
        }
    }

    /// Conversion rule applied when sampling
    pub fn conversion(self) -> Conversion {
        match self {
            MetricKind::Xfers
            | MetricKind::Wbytes
            | MetricKind::Rbytes
            | MetricKind::Time
            | MetricKind::WqSampled => Conversion::Rate,
            MetricKind::QFull => Conversion::Delta,
            MetricKind::Rserv | MetricKind::Wserv | MetricKind::WqTime => Conversion::ServiceTime,
            _ => Conversion::Gauge,
        }
    }

    /// Only available on platforms reporting extended timing counters
    pub fn is_extended(self) -> bool {
        self.index() >= MetricKind::QFull.index()
    }

    /// Kinds available under the given capability
    pub fn available(extended: bool) -> impl Iterator<Item = MetricKind> {
        Self::ALL
            .into_iter()
            .filter(move |kind| extended || !kind.is_extended())
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value type announced to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Double,
}

/// Registration record for one (device, metric) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    /// `<device>_<metric>`
    pub name: String,
    /// Index of the device in the registry
    pub device_index: usize,
    /// Metric kind
    pub kind: MetricKind,
    /// `<device> <description>`
    pub description: String,
    /// Display units
    pub units: String,
    /// Value type
    pub value_type: ValueType,
    /// Slope hint for graphing
    pub slope: String,
    /// printf-style display format
    pub format: String,
    /// Maximum seconds between value reports
    pub tmax: u32,
    /// Grouping tag
    pub group: String,
}

/// Build the identifier for a device metric
pub fn metric_identifier(device: &str, kind: MetricKind) -> String {
    format!("{}_{}", device, kind.name())
}

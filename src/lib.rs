//! # diskmon
//!
//! Per-device disk I/O metrics for monitoring collectors. diskmon discovers the
//! host's disks once, polls their raw cumulative counters on demand, and turns
//! them into time-normalized values (transfers/sec, bytes/sec, service times in
//! milliseconds) that a collector can pull by name.
//!
//! ## Features
//!
//! - **Rate conversion**: cumulative counters become per-second rates against a
//!   cached previous sample, with counters that go backwards held at their last
//!   displayed value
//! - **Throttled sampling**: reads within a device's threshold reuse the cached
//!   sample instead of querying the OS again
//! - **Extended timing metrics**: service and queue times where the platform
//!   reports them, selected at runtime
//! - **Pluggable sources**: the OS is a [`DiskStatsSource`] trait; Linux sysfs is
//!   built in, and a scripted source drives tests
//!
//! ## Quick Start
//!
//! ```no_run
//! use diskmon::{BootClock, Config, DiskMetrics};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let metrics = DiskMetrics::init(
//!     diskmon::disk::platform_source()?,
//!     Box::new(BootClock::new()),
//!     &config,
//! )?;
//!
//! println!("sda write rate: {:.1} bytes/sec", metrics.handle("sda_wbytes"));
//! # Ok(())
//! # }
//! ```
//!
//! Disabled devices report [`UNAVAILABLE`] (`-1.0`); identifiers that do not
//! name a registered metric report `0.0`.

pub mod clock; // Boot-relative and manual time sources
pub mod config; // Configuration management with TOML persistence
pub mod disk; // OS counter sources
pub mod dispatch; // Identifier to (device, metric) lookup
pub mod error;
pub mod metric; // Metric kinds and descriptors
pub mod module; // DiskMetrics lifecycle and accessor
pub mod registry; // Device discovery
pub mod sampler;
pub mod store; // Counter baselines and conversion rules

pub use clock::{BootClock, Clock, ManualClock};
pub use config::{AccountingConfig, Config, DescriptorConfig, DeviceConfig, SamplingConfig};
pub use disk::{Capabilities, DiskStatsSource, RawDiskCounters, ScriptedSource};
pub use dispatch::{MetricHandle, MetricTable};
pub use error::{Error, Result};
pub use metric::{metric_identifier, MetricDescriptor, MetricKind, ValueType};
pub use module::{DiskMetrics, UNAVAILABLE, UNKNOWN};
pub use registry::Device;
pub use sampler::SampleOutcome;
pub use store::{CounterStore, MetricSeries};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! The disk metrics module: lifecycle, rate-limited access and dispatch
//!
//! A [`DiskMetrics`] owns everything the collector talks to: the OS source,
//! the device registry with one counter store per device, the metric
//! descriptors, and the identifier lookup table.
//!
//! # Examples
//!
//! ```no_run
//! use diskmon::{BootClock, Config, DiskMetrics};
//!
//! let source = diskmon::disk::platform_source()?;
//! let metrics = DiskMetrics::init(source, Box::new(BootClock::new()), &Config::default())?;
//!
//! for descriptor in metrics.descriptors() {
//!     println!("{} = {:.1}", descriptor.name, metrics.handle(&descriptor.name));
//! }
//! # Ok::<(), diskmon::Error>(())
//! ```

use crate::clock::Clock;
use crate::config::Config;
use crate::disk::{Capabilities, DiskStatsSource};
use crate::dispatch::{MetricHandle, MetricTable};
use crate::error::Result;
use crate::metric::{metric_identifier, MetricDescriptor, MetricKind, ValueType};
use crate::registry::{self, Device};
use crate::sampler::{self, SampleOutcome};
use crate::store::CounterStore;
use log::{debug, info, trace, warn};
use std::sync::{Mutex, MutexGuard};

/// Value reported for disabled or unavailable devices
pub const UNAVAILABLE: f64 = -1.0;

/// Value reported for identifiers or indices that resolve to nothing
pub const UNKNOWN: f64 = 0.0;

struct DeviceState {
    device: Device,
    store: CounterStore,
    /// Time of the frame the store's baselines were taken from
    baseline_time: f64,
}

/// Per-device disk I/O metrics
pub struct DiskMetrics {
    source: Box<dyn DiskStatsSource>,
    clock: Box<dyn Clock>,
    devices: Vec<Mutex<DeviceState>>,
    capabilities: Capabilities,
    descriptors: Vec<MetricDescriptor>,
    table: MetricTable,
    /// Accounting state to put back at cleanup, when we changed it
    restore_accounting: Option<bool>,
}

impl DiskMetrics {
    /// Enable I/O accounting, discover devices, register metrics and prime baselines
    pub fn init(
        source: Box<dyn DiskStatsSource>,
        clock: Box<dyn Clock>,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;

        let restore_accounting = if config.accounting.manage {
            enable_accounting(source.as_ref())
        } else {
            None
        };

        let capabilities = source.capabilities();
        let discovered = registry::discover(source.as_ref(), config)?;
        let descriptors = build_descriptors(&discovered, &capabilities, config)?;
        let table = MetricTable::from_descriptors(&descriptors);

        info!(
            "Registered {} metric(s) for {} disk(s), extended timing {}",
            descriptors.len(),
            discovered.len(),
            if capabilities.extended { "available" } else { "unavailable" }
        );

        let now = clock.now();
        let mut devices = Vec::new();
        devices.try_reserve_exact(discovered.len())?;

        for device in discovered {
            let mut state = DeviceState {
                device,
                store: CounterStore::new(),
                baseline_time: 0.0,
            };

            if config.sampling.prime_on_start && state.device.enabled {
                let outcome = sampler::prime(
                    source.as_ref(),
                    &state.device.name,
                    &mut state.store,
                    &capabilities,
                );
                if outcome == SampleOutcome::Updated {
                    state.baseline_time = now;
                }
                state.device.last_sample_time = now;
            }

            devices.push(Mutex::new(state));
        }

        Ok(Self {
            source,
            clock,
            devices,
            capabilities,
            descriptors,
            table,
            restore_accounting,
        })
    }

    /// Read one metric of one device, sampling the OS if the device's data is stale
    ///
    /// Disabled devices report [`UNAVAILABLE`]; an out-of-range index reports
    /// [`UNKNOWN`].
    pub fn read(&self, index: usize, kind: MetricKind) -> f64 {
        let Some(mut state) = self.lock(index) else {
            return UNKNOWN;
        };

        if !state.device.enabled {
            return UNAVAILABLE;
        }

        let now = self.clock.now();
        if state.device.is_due(now) {
            self.sample_locked(&mut state, now);
        } else {
            trace!(
                "Using cached values for disk {} ({:.3}s since last sample)",
                state.device.name,
                state.device.elapsed(now)
            );
        }

        state.store.current(kind)
    }

    /// Sample a device now regardless of its threshold
    pub fn refresh(&self, index: usize) -> Option<SampleOutcome> {
        let mut state = self.lock(index)?;
        if !state.device.enabled {
            return None;
        }
        let now = self.clock.now();
        Some(self.sample_locked(&mut state, now))
    }

    /// Sample every enabled device now
    pub fn refresh_all(&self) {
        for index in 0..self.devices.len() {
            self.refresh(index);
        }
    }

    fn sample_locked(&self, state: &mut DeviceState, now: f64) -> SampleOutcome {
        let DeviceState {
            device,
            store,
            baseline_time,
        } = state;

        let outcome = sampler::sample(
            self.source.as_ref(),
            &device.name,
            store,
            now - *baseline_time,
            &self.capabilities,
        );
        if outcome == SampleOutcome::Updated {
            *baseline_time = now;
        }
        device.last_sample_time = now;
        outcome
    }

    fn lock(&self, index: usize) -> Option<MutexGuard<'_, DeviceState>> {
        self.devices
            .get(index)
            .map(|slot| slot.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Resolve a `<device>_<metric>` identifier
    pub fn resolve(&self, identifier: &str) -> Option<MetricHandle> {
        self.table.resolve(identifier)
    }

    /// Read a metric by identifier, [`UNKNOWN`] when it resolves to nothing
    pub fn handle(&self, identifier: &str) -> f64 {
        match self.resolve(identifier) {
            Some(handle) => self.read(handle.device, handle.kind),
            None => {
                debug!("Unknown metric identifier {}", identifier);
                UNKNOWN
            }
        }
    }

    /// Registered metric descriptors, device by device
    pub fn descriptors(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Restore the I/O accounting state found at init
    ///
    /// Runs at most once; dropping the module calls it if needed.
    pub fn cleanup(&mut self) {
        let Some(previous) = self.restore_accounting.take() else {
            return;
        };

        match self.source.set_io_accounting(previous) {
            Ok(()) => info!("Restored disk I/O accounting to {}", on_off(previous)),
            Err(e) => warn!("Failed to restore disk I/O accounting: {}", e),
        }
    }
}

impl Drop for DiskMetrics {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Turn accounting on, returning the state to restore if it was off
fn enable_accounting(source: &dyn DiskStatsSource) -> Option<bool> {
    let enabled = match source.io_accounting() {
        Ok(enabled) => enabled,
        Err(e) => {
            warn!("Cannot read disk I/O accounting state: {}", e);
            return None;
        }
    };

    if enabled {
        debug!("Disk I/O accounting already enabled");
        return None;
    }

    match source.set_io_accounting(true) {
        Ok(()) => {
            info!("Enabled disk I/O accounting");
            Some(false)
        }
        Err(e) => {
            warn!("Failed to enable disk I/O accounting: {}", e);
            None
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn build_descriptors(
    devices: &[Device],
    capabilities: &Capabilities,
    config: &Config,
) -> Result<Vec<MetricDescriptor>> {
    let per_device = MetricKind::available(capabilities.extended).count();
    let mut descriptors = Vec::new();
    descriptors.try_reserve_exact(devices.len() * per_device)?;

    for (index, device) in devices.iter().enumerate() {
        for kind in MetricKind::available(capabilities.extended) {
            descriptors.push(MetricDescriptor {
                name: metric_identifier(&device.name, kind),
                device_index: index,
                kind,
                description: format!("{} {}", device.name, kind.description()),
                units: kind.units().to_string(),
                value_type: ValueType::Double,
                slope: "both".to_string(),
                format: config.descriptor.format.clone(),
                tmax: config.descriptor.tmax,
                group: config.descriptor.group.clone(),
            });
        }
    }

    Ok(descriptors)
}

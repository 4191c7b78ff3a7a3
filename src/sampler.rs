//! One sampling pass for one device

use crate::disk::{Capabilities, DiskStatsSource};
use crate::metric::MetricKind;
use crate::store::CounterStore;
use log::{debug, log_enabled, warn, Level};

/// What a sampling pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Counters were read and the store updated
    Updated,
    /// The OS had no data or the query failed; the store is unchanged
    Stale,
}

/// Query the OS once for `device` and feed the result into `store`
///
/// `elapsed` is the time since the device's previous sample. A failed query
/// leaves every value and baseline as it was.
pub fn sample(
    source: &dyn DiskStatsSource,
    device: &str,
    store: &mut CounterStore,
    elapsed: f64,
    caps: &Capabilities,
) -> SampleOutcome {
    let raw = match source.query_disk(device) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            warn!("No statistics reported for disk {}, keeping previous values", device);
            return SampleOutcome::Stale;
        }
        Err(e) => {
            warn!("Failed to query disk {}: {}, keeping previous values", device, e);
            return SampleOutcome::Stale;
        }
    };

    let report = store.apply(&raw, elapsed, caps);

    if report.held {
        warn!(
            "Non-positive interval ({:.3}s) for disk {}, values held",
            elapsed, device
        );
    }
    if !report.regressions.is_empty() {
        warn!(
            "Counters went backwards on disk {}: {}",
            device,
            report
                .regressions
                .iter()
                .map(|kind| kind.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    if log_enabled!(Level::Debug) {
        debug!("Sampled disk {} after {:.3}s", device, elapsed);
        for kind in MetricKind::available(caps.extended) {
            debug!("  {:<12} = {:.1} {}", kind.name(), store.current(kind), kind.units());
        }
    }

    SampleOutcome::Updated
}

/// Establish baselines for `device` without computing rates
pub fn prime(
    source: &dyn DiskStatsSource,
    device: &str,
    store: &mut CounterStore,
    caps: &Capabilities,
) -> SampleOutcome {
    match source.query_disk(device) {
        Ok(Some(raw)) => {
            store.prime(&raw, caps);
            debug!("Primed baselines for disk {}", device);
            SampleOutcome::Updated
        }
        Ok(None) => {
            warn!("No statistics reported for disk {} while priming", device);
            SampleOutcome::Stale
        }
        Err(e) => {
            warn!("Failed to prime disk {}: {}", device, e);
            SampleOutcome::Stale
        }
    }
}

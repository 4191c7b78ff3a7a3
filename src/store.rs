//! Per-device counter store and conversion rules
//!
//! Each device owns one [`CounterStore`] holding a [`MetricSeries`] per
//! [`MetricKind`]. A sample feeds one frame of raw counters through
//! [`CounterStore::apply`], which turns cumulative counters into rates using
//! the previous frame as baseline. How each kind is derived follows its
//! [`Conversion`].
//!
//! Cumulative counters are expected to grow. When one goes backwards (wrap,
//! reset, device reinitialisation) the affected metric keeps its previously
//! displayed value instead of reporting a negative rate, and the baseline
//! still moves to the new raw value so the next delta is sane again.

use crate::disk::{Capabilities, RawDiskCounters};
use crate::metric::{Conversion, MetricKind};
use serde::{Deserialize, Serialize};

const MIB: f64 = 1024.0 * 1024.0;
const KIB: f64 = 1024.0;

/// State of one (device, metric) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// Last raw cumulative value read from the OS
    pub last_raw: u64,
    /// Most recently exposed value
    pub last_value: f64,
    /// Working value of the current sample
    pub current: f64,
}

impl MetricSeries {
    /// Delta against the baseline, `None` when the counter went backwards
    fn delta(&self, raw: u64) -> Option<u64> {
        raw.checked_sub(self.last_raw)
    }

    fn set(&mut self, value: f64) {
        self.current = value;
        self.last_value = value;
    }

    fn hold(&mut self) {
        self.current = self.last_value;
    }
}

/// Outcome of applying one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Metrics whose delta was discarded because a counter went backwards
    pub regressions: Vec<MetricKind>,
    /// The frame only moved baselines; every value was held
    pub held: bool,
}

/// Signed deltas of the counters service times divide by
#[derive(Debug, Clone, Copy)]
struct Companions {
    xfers: i128,
    xrate: i128,
}

/// All metric series of one device
#[derive(Debug, Clone, PartialEq)]
pub struct CounterStore {
    series: [MetricSeries; MetricKind::COUNT],
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore {
    /// Zero-initialized store
    pub fn new() -> Self {
        Self {
            series: [MetricSeries::default(); MetricKind::COUNT],
        }
    }

    pub fn series(&self, kind: MetricKind) -> &MetricSeries {
        &self.series[kind.index()]
    }

    fn series_mut(&mut self, kind: MetricKind) -> &mut MetricSeries {
        &mut self.series[kind.index()]
    }

    /// Current value of a metric
    pub fn current(&self, kind: MetricKind) -> f64 {
        self.series(kind).current
    }

    /// Establish baselines and gauges from a first frame without computing rates
    pub fn prime(&mut self, raw: &RawDiskCounters, caps: &Capabilities) {
        for kind in MetricKind::available(caps.extended) {
            if kind.conversion() == Conversion::Gauge {
                self.series_mut(kind).set(gauge(kind, raw.value(kind), caps));
            }
        }
        self.advance_baselines(raw);
    }

    /// Feed one frame of raw counters sampled `elapsed` seconds after the previous one
    ///
    /// With a non-positive `elapsed` nothing is recomputed; only the baselines move.
    pub fn apply(&mut self, raw: &RawDiskCounters, elapsed: f64, caps: &Capabilities) -> ApplyReport {
        let mut report = ApplyReport::default();

        if !(elapsed > 0.0) {
            for series in self.series.iter_mut() {
                series.hold();
            }
            self.advance_baselines(raw);
            report.held = true;
            return report;
        }

        // Taken against the previous frame, before any baseline moves
        let companions = Companions {
            xfers: signed_delta(raw.xfers, self.series(MetricKind::Xfers).last_raw),
            xrate: signed_delta(raw.xrate, self.series(MetricKind::Xrate).last_raw),
        };

        for kind in MetricKind::available(caps.extended) {
            let value = raw.value(kind);
            match kind.conversion() {
                Conversion::Gauge => self.series_mut(kind).set(gauge(kind, value, caps)),
                Conversion::Rate => self.guarded(kind, value, &mut report, |d| {
                    Some(rate(kind, d, elapsed, raw.bsize, caps))
                }),
                Conversion::Delta => self.guarded(kind, value, &mut report, Some),
                Conversion::ServiceTime => self.guarded(kind, value, &mut report, |d| {
                    service_time(kind, caps.ticks_to_ms(d), elapsed, companions)
                }),
            }
        }

        self.advance_baselines(raw);
        report
    }

    /// Guarded update: `convert` receives the non-negative delta
    fn guarded<F>(&mut self, kind: MetricKind, raw: u64, report: &mut ApplyReport, convert: F)
    where
        F: FnOnce(f64) -> Option<f64>,
    {
        let series = self.series_mut(kind);
        match series.delta(raw).and_then(|delta| convert(delta as f64)) {
            Some(value) => series.set(value),
            None => {
                series.hold();
                report.regressions.push(kind);
            }
        }
    }

    fn advance_baselines(&mut self, raw: &RawDiskCounters) {
        for kind in MetricKind::ALL {
            self.series_mut(kind).last_raw = raw.value(kind);
        }
    }
}

/// Unit-scaled gauge value
fn gauge(kind: MetricKind, raw: u64, caps: &Capabilities) -> f64 {
    match kind {
        MetricKind::Size | MetricKind::Free => raw as f64 * MIB,
        MetricKind::Xrate => raw as f64 * KIB,
        MetricKind::MinRserv
        | MetricKind::MaxRserv
        | MetricKind::MinWserv
        | MetricKind::MaxWserv
        | MetricKind::WqMinTime
        | MetricKind::WqMaxTime => caps.ticks_to_ms(raw as f64),
        _ => raw as f64,
    }
}

/// Per-second rate of a counter delta
fn rate(kind: MetricKind, delta: f64, elapsed: f64, bsize: u64, caps: &Capabilities) -> f64 {
    match kind {
        MetricKind::Wbytes | MetricKind::Rbytes => delta / elapsed * bsize as f64,
        MetricKind::WqSampled => delta / (100.0 * elapsed * caps.cpu_count.max(1) as f64),
        _ => delta / elapsed,
    }
}

/// Milliseconds per transfer, `None` when the companion went backwards
///
/// `wserv` divides by the transfer delta minus the `xrate` delta. The
/// physical meaning of that divisor is unclear; it is kept as the platform
/// counters define it.
fn service_time(kind: MetricKind, ms: f64, elapsed: f64, companions: Companions) -> Option<f64> {
    match kind {
        MetricKind::Rserv => per_transfer(ms, companions.xrate),
        MetricKind::Wserv => per_transfer(ms, companions.xfers - companions.xrate),
        MetricKind::WqTime => per_transfer(ms, companions.xfers).map(|ms| ms / elapsed),
        _ => Some(ms),
    }
}

fn signed_delta(raw: u64, baseline: u64) -> i128 {
    raw as i128 - baseline as i128
}

/// Divide by a transfer count, treating zero transfers as one
///
/// Returns `None` for a negative count so the caller holds the last value.
fn per_transfer(ms: f64, transfers: i128) -> Option<f64> {
    match transfers {
        t if t < 0 => None,
        0 => Some(ms),
        t => Some(ms / t as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic() -> Capabilities {
        Capabilities::basic()
    }

    fn extended() -> Capabilities {
        Capabilities {
            extended: true,
            tick_ratio: 1_000_000.0,
            cpu_count: 2,
        }
    }

    fn xfers(value: u64) -> RawDiskCounters {
        RawDiskCounters {
            xfers: value,
            ..Default::default()
        }
    }

    #[test]
    fn test_rate_series() {
        let mut store = CounterStore::new();
        store.prime(&xfers(100), &basic());
        assert_eq!(store.current(MetricKind::Xfers), 0.0);

        let mut rates = Vec::new();
        for raw in [150, 150, 220] {
            let report = store.apply(&xfers(raw), 5.0, &basic());
            assert!(report.regressions.is_empty());
            rates.push(store.current(MetricKind::Xfers));
        }
        assert_eq!(rates, vec![10.0, 0.0, 14.0]);
    }

    #[test]
    fn test_regression_holds_value_and_moves_baseline() {
        let mut store = CounterStore::new();
        store.apply(&xfers(500), 5.0, &basic());
        let first = store.current(MetricKind::Xfers);
        assert_eq!(first, 100.0);

        let report = store.apply(&xfers(300), 5.0, &basic());
        assert_eq!(report.regressions, vec![MetricKind::Xfers]);
        assert_eq!(store.current(MetricKind::Xfers), first);
        assert_eq!(store.series(MetricKind::Xfers).last_raw, 300);

        // Next delta is measured from the new baseline
        store.apply(&xfers(350), 5.0, &basic());
        assert_eq!(store.current(MetricKind::Xfers), 10.0);
    }

    #[test]
    fn test_size_scaled_once() {
        let mut store = CounterStore::new();
        let raw = RawDiskCounters {
            size: 2048,
            free: 1,
            xrate: 3,
            ..Default::default()
        };
        store.apply(&raw, 5.0, &basic());
        store.apply(&raw, 5.0, &basic());
        assert_eq!(store.current(MetricKind::Size), 2_147_483_648.0);
        assert_eq!(store.current(MetricKind::Free), 1_048_576.0);
        assert_eq!(store.current(MetricKind::Xrate), 3072.0);
    }

    #[test]
    fn test_block_rates_use_block_size() {
        let mut store = CounterStore::new();
        let mut raw = RawDiskCounters {
            bsize: 512,
            rblks: 1_000,
            wblks: 2_000,
            ..Default::default()
        };
        store.prime(&raw, &basic());

        raw.rblks += 100;
        raw.wblks += 40;
        store.apply(&raw, 2.0, &basic());
        assert_eq!(store.current(MetricKind::Rbytes), 25_600.0);
        assert_eq!(store.current(MetricKind::Wbytes), 10_240.0);
    }

    #[test]
    fn test_zero_elapsed_holds_values() {
        let mut store = CounterStore::new();
        store.prime(&xfers(100), &basic());
        store.apply(&xfers(150), 5.0, &basic());

        let report = store.apply(&xfers(400), 0.0, &basic());
        assert!(report.held);
        assert_eq!(store.current(MetricKind::Xfers), 10.0);
        assert_eq!(store.series(MetricKind::Xfers).last_raw, 400);
    }

    #[test]
    fn test_extended_untouched_without_capability() {
        let mut store = CounterStore::new();
        let raw = RawDiskCounters {
            rserv: 1_000,
            wq_depth: 7,
            ..Default::default()
        };
        store.apply(&raw, 5.0, &basic());
        assert_eq!(store.current(MetricKind::Rserv), 0.0);
        assert_eq!(store.current(MetricKind::WqDepth), 0.0);
    }

    #[test]
    fn test_service_times() {
        let caps = extended();
        let mut store = CounterStore::new();
        let mut raw = RawDiskCounters {
            xfers: 1_000,
            xrate: 100,
            rserv: 1_000,
            wserv: 1_000,
            wq_time: 5_000,
            ..Default::default()
        };
        store.prime(&raw, &caps);

        raw.xfers += 50;
        raw.xrate += 20;
        raw.rserv += 100;
        raw.wserv += 300;
        raw.wq_time += 500;
        store.apply(&raw, 5.0, &caps);

        // rserv / d(xrate), wserv / (d(xfers) - d(xrate)), wq_time / d(xfers) / elapsed
        assert_eq!(store.current(MetricKind::Rserv), 5.0);
        assert_eq!(store.current(MetricKind::Wserv), 10.0);
        assert_eq!(store.current(MetricKind::WqTime), 2.0);
    }

    #[test]
    fn test_service_time_zero_divisor_uses_one() {
        let caps = extended();
        let mut store = CounterStore::new();
        let mut raw = RawDiskCounters {
            rserv: 100,
            ..Default::default()
        };
        store.prime(&raw, &caps);

        raw.rserv += 42;
        store.apply(&raw, 5.0, &caps);
        assert_eq!(store.current(MetricKind::Rserv), 42.0);
    }

    #[test]
    fn test_companion_regression_holds_service_time() {
        let caps = extended();
        let mut store = CounterStore::new();
        let mut raw = RawDiskCounters {
            xfers: 100,
            xrate: 50,
            rserv: 100,
            ..Default::default()
        };
        store.prime(&raw, &caps);

        raw.xrate += 10;
        raw.xfers += 10;
        raw.rserv += 30;
        store.apply(&raw, 5.0, &caps);
        assert_eq!(store.current(MetricKind::Rserv), 3.0);

        raw.xrate = 0;
        raw.rserv += 30;
        let report = store.apply(&raw, 5.0, &caps);
        assert!(report.regressions.contains(&MetricKind::Rserv));
        assert_eq!(store.current(MetricKind::Rserv), 3.0);
    }

    #[test]
    fn test_wait_queue_time_holds_when_transfers_go_backwards() {
        let caps = extended();
        let mut store = CounterStore::new();
        let mut raw = RawDiskCounters {
            xfers: 1_000,
            wq_time: 5_000,
            ..Default::default()
        };
        store.prime(&raw, &caps);

        raw.xfers += 50;
        raw.wq_time += 500;
        store.apply(&raw, 5.0, &caps);
        assert_eq!(store.current(MetricKind::WqTime), 2.0);

        raw.xfers = 10;
        raw.wq_time += 500;
        let report = store.apply(&raw, 5.0, &caps);
        assert!(report.regressions.contains(&MetricKind::WqTime));
        assert_eq!(store.current(MetricKind::WqTime), 2.0);
        assert_eq!(store.series(MetricKind::WqTime).last_raw, 6_000);
    }

    #[test]
    fn test_active_time_percent() {
        let mut store = CounterStore::new();
        let mut raw = RawDiskCounters {
            time: 1_000,
            ..Default::default()
        };
        store.prime(&raw, &basic());

        // 250 ticks of 1/100 s over 5 s: busy half the time
        raw.time += 250;
        store.apply(&raw, 5.0, &basic());
        assert_eq!(store.current(MetricKind::Time), 50.0);
    }

    #[test]
    fn test_queue_metrics() {
        let caps = extended();
        let mut store = CounterStore::new();
        let mut raw = RawDiskCounters {
            q_full: 3,
            wq_sampled: 1_000,
            max_rserv: 7,
            ..Default::default()
        };
        store.prime(&raw, &caps);
        assert_eq!(store.current(MetricKind::MaxRserv), 7.0);

        raw.q_full = 8;
        raw.wq_sampled = 3_000;
        store.apply(&raw, 5.0, &caps);
        assert_eq!(store.current(MetricKind::QFull), 5.0);
        // 2000 / (100 * 5 * 2)
        assert_eq!(store.current(MetricKind::WqSampled), 2.0);
    }
}

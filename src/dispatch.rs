//! Metric identifier dispatch
//!
//! Identifiers are `<device>_<metric>`. Device names may themselves contain
//! underscores, so identifiers are resolved through a table built from the
//! registered descriptors rather than by splitting the string.

use crate::metric::{MetricDescriptor, MetricKind};
use log::warn;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Resolved target of a metric identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricHandle {
    /// Index of the device in the registry
    pub device: usize,
    /// Metric kind
    pub kind: MetricKind,
}

/// Lookup from identifier to (device, metric)
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    entries: HashMap<String, MetricHandle>,
}

impl MetricTable {
    /// Build the table from registered descriptors
    ///
    /// When two descriptors share an identifier the first one registered
    /// keeps it.
    pub fn from_descriptors(descriptors: &[MetricDescriptor]) -> Self {
        let mut entries = HashMap::with_capacity(descriptors.len());

        for d in descriptors {
            let handle = MetricHandle {
                device: d.device_index,
                kind: d.kind,
            };
            match entries.entry(d.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(handle);
                }
                Entry::Occupied(existing) => warn!(
                    "Metric identifier {} is ambiguous: device {} {} shadowed by device {} {}",
                    d.name,
                    d.device_index,
                    d.kind,
                    existing.get().device,
                    existing.get().kind
                ),
            }
        }

        Self { entries }
    }

    /// Resolve an identifier, `None` for unknown device or metric
    pub fn resolve(&self, identifier: &str) -> Option<MetricHandle> {
        self.entries.get(identifier).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{metric_identifier, ValueType};

    fn descriptor(device: &str, index: usize, kind: MetricKind) -> MetricDescriptor {
        MetricDescriptor {
            name: metric_identifier(device, kind),
            device_index: index,
            kind,
            description: format!("{} {}", device, kind.description()),
            units: kind.units().to_string(),
            value_type: ValueType::Double,
            slope: "both".to_string(),
            format: "%.1f".to_string(),
            tmax: 60,
            group: "disk".to_string(),
        }
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let table = MetricTable::from_descriptors(&[
            descriptor("disk1", 0, MetricKind::Xfers),
            descriptor("disk1", 0, MetricKind::QFull),
        ]);

        assert_eq!(
            table.resolve("disk1_xfers"),
            Some(MetricHandle {
                device: 0,
                kind: MetricKind::Xfers
            })
        );
        assert_eq!(table.resolve("disk1_q_full").map(|h| h.kind), Some(MetricKind::QFull));
        assert_eq!(table.resolve("unknownDev_xfers"), None);
        assert_eq!(table.resolve("disk1_unknownMetric"), None);
        assert_eq!(table.resolve("disk1"), None);
    }

    #[test]
    fn test_underscored_device_names() {
        let table = MetricTable::from_descriptors(&[
            descriptor("nvme_a", 0, MetricKind::Xfers),
            descriptor("nvme", 1, MetricKind::Xfers),
        ]);
        assert_eq!(table.resolve("nvme_a_xfers").map(|h| h.device), Some(0));
        assert_eq!(table.resolve("nvme_xfers").map(|h| h.device), Some(1));
    }

    #[test]
    fn test_colliding_identifiers_keep_first() {
        // "disk" + "wq_time" and "disk_wq" + "time" spell the same identifier
        let table = MetricTable::from_descriptors(&[
            descriptor("disk", 0, MetricKind::WqTime),
            descriptor("disk_wq", 1, MetricKind::Time),
        ]);
        assert_eq!(
            table.resolve("disk_wq_time"),
            Some(MetricHandle {
                device: 0,
                kind: MetricKind::WqTime
            })
        );
    }
}

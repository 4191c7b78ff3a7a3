//! Scripted in-memory disk counter source
//!
//! Used by tests to drive the sampling engine without touching the OS.
//! Every `query_disk` pops the next scripted frame for that device; once a
//! device's script runs dry the last frame repeats.

use crate::disk::traits::*;
use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

struct DeviceScript {
    frames: VecDeque<Option<RawDiskCounters>>,
    last: Option<RawDiskCounters>,
    queries: usize,
}

/// Disk counter source replaying scripted frames
pub struct ScriptedSource {
    names: Vec<String>,
    scripts: Mutex<HashMap<String, DeviceScript>>,
    capabilities: Capabilities,
    fail_listing: bool,
    accounting: AtomicBool,
    accounting_writes: AtomicUsize,
}

impl ScriptedSource {
    /// Create a source reporting the given devices with empty scripts
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let scripts = names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    DeviceScript {
                        frames: VecDeque::new(),
                        last: None,
                        queries: 0,
                    },
                )
            })
            .collect();

        Self {
            names,
            scripts: Mutex::new(scripts),
            capabilities: Capabilities::basic(),
            fail_listing: false,
            accounting: AtomicBool::new(false),
            accounting_writes: AtomicUsize::new(0),
        }
    }

    /// A source whose enumeration call fails
    pub fn failing() -> Self {
        Self {
            fail_listing: true,
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Report the given capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Start with I/O accounting in the given state
    pub fn with_accounting(self, enabled: bool) -> Self {
        self.accounting.store(enabled, Ordering::SeqCst);
        self
    }

    /// Append a frame to a device's script
    pub fn push(&self, name: &str, counters: RawDiskCounters) {
        self.push_frame(name, Some(counters));
    }

    /// Append a "no data" response to a device's script
    pub fn push_missing(&self, name: &str) {
        self.push_frame(name, None);
    }

    fn push_frame(&self, name: &str, frame: Option<RawDiskCounters>) {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(script) = scripts.get_mut(name) {
            script.frames.push_back(frame);
        }
    }

    /// Number of `query_disk` calls issued for a device
    pub fn queries(&self, name: &str) -> usize {
        let scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.get(name).map(|s| s.queries).unwrap_or(0)
    }

    /// Total number of `query_disk` calls across all devices
    pub fn total_queries(&self) -> usize {
        let scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.values().map(|s| s.queries).sum()
    }

    /// Number of `set_io_accounting` calls
    pub fn accounting_writes(&self) -> usize {
        self.accounting_writes.load(Ordering::SeqCst)
    }
}

impl DiskStatsSource for ScriptedSource {
    fn list_disks(&self) -> Result<Vec<String>> {
        if self.fail_listing {
            return Err(Error::QueryFailed("scripted enumeration failure".to_string()));
        }
        Ok(self.names.clone())
    }

    fn query_disk(&self, name: &str) -> Result<Option<RawDiskCounters>> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        let Some(script) = scripts.get_mut(name) else {
            return Ok(None);
        };

        script.queries += 1;
        match script.frames.pop_front() {
            Some(Some(frame)) => {
                script.last = Some(frame.clone());
                Ok(Some(frame))
            }
            Some(None) => Ok(None),
            None => Ok(script.last.clone()),
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn io_accounting(&self) -> Result<bool> {
        Ok(self.accounting.load(Ordering::SeqCst))
    }

    fn set_io_accounting(&self, enabled: bool) -> Result<()> {
        self.accounting.store(enabled, Ordering::SeqCst);
        self.accounting_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(xfers: u64) -> RawDiskCounters {
        RawDiskCounters {
            xfers,
            ..Default::default()
        }
    }

    #[test]
    fn test_script_replays_and_repeats_last() {
        let source = ScriptedSource::new(["disk1"]);
        source.push("disk1", frame(10));
        source.push("disk1", frame(20));

        assert_eq!(source.query_disk("disk1").unwrap().unwrap().xfers, 10);
        assert_eq!(source.query_disk("disk1").unwrap().unwrap().xfers, 20);
        assert_eq!(source.query_disk("disk1").unwrap().unwrap().xfers, 20);
        assert_eq!(source.queries("disk1"), 3);
    }

    #[test]
    fn test_missing_frame_and_unknown_device() {
        let source = ScriptedSource::new(["disk1"]);
        source.push_missing("disk1");
        assert!(source.query_disk("disk1").unwrap().is_none());
        assert!(source.query_disk("disk9").unwrap().is_none());
        assert_eq!(source.total_queries(), 1);
    }

    #[test]
    fn test_failing_listing() {
        assert!(ScriptedSource::failing().list_disks().is_err());
    }
}

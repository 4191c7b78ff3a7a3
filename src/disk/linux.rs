//! Linux disk counters via sysfs

use crate::disk::traits::*;
use crate::error::{Error, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Bytes per sector in /sys/block/<dev>/stat and /sys/block/<dev>/size
const SECTOR_SIZE: u64 = 512;

const MIB: u64 = 1024 * 1024;

/// Linux counters are already in milliseconds
const MS_TICK_RATIO: f64 = 1_000_000.0;

/// Fields of /sys/block/<dev>/stat
///
/// Format: read_ios read_merges read_sectors read_ticks write_ios write_merges
/// write_sectors write_ticks in_flight io_ticks time_in_queue
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockStat {
    pub read_ios: u64,
    pub read_sectors: u64,
    pub read_ticks_ms: u64,
    pub write_ios: u64,
    pub write_sectors: u64,
    pub write_ticks_ms: u64,
    pub in_flight: u64,
    pub io_ticks_ms: u64,
    pub time_in_queue_ms: u64,
}

impl BlockStat {
    /// Parse the contents of a /sys/block/<dev>/stat file
    pub fn parse(content: &str) -> Result<Self> {
        let parts: Vec<&str> = content.split_whitespace().collect();
        if parts.len() < 11 {
            return Err(Error::Parse(format!(
                "Invalid stat format: expected at least 11 fields, got {}",
                parts.len()
            )));
        }

        let field = |idx: usize| -> Result<u64> {
            parts[idx]
                .parse()
                .map_err(|e| Error::Parse(format!("Failed to parse stat field {}: {}", idx, e)))
        };

        Ok(Self {
            read_ios: field(0)?,
            read_sectors: field(2)?,
            read_ticks_ms: field(3)?,
            write_ios: field(4)?,
            write_sectors: field(6)?,
            write_ticks_ms: field(7)?,
            in_flight: field(8)?,
            io_ticks_ms: field(9)?,
            time_in_queue_ms: field(10)?,
        })
    }

    /// Map Linux block statistics onto the raw counter set
    ///
    /// Sectors stand in for blocks, so `bsize` is the sector size. Active time
    /// is reported in 1/100 s ticks to match the percent-busy conversion. Read
    /// completions go in the `xrate` slot, the read service time divisor.
    pub fn to_raw(&self, size_sectors: u64) -> RawDiskCounters {
        RawDiskCounters {
            size: size_sectors * SECTOR_SIZE / MIB,
            bsize: SECTOR_SIZE,
            xfers: self.read_ios + self.write_ios,
            xrate: self.read_ios,
            wblks: self.write_sectors,
            rblks: self.read_sectors,
            qdepth: self.in_flight,
            time: self.io_ticks_ms / 10,
            rserv: self.read_ticks_ms,
            wserv: self.write_ticks_ms,
            wq_depth: self.in_flight,
            wq_time: self.time_in_queue_ms,
            ..Default::default()
        }
    }
}

/// Disk counter source backed by /sys/block
pub struct LinuxDiskSource {
    sys_block: PathBuf,
    cpu_count: usize,
}

impl LinuxDiskSource {
    /// Create a source reading the live /sys/block tree
    pub fn new() -> Self {
        Self::with_root("/sys/block")
    }

    /// Create a source reading an alternative sysfs block directory
    pub fn with_root<P: AsRef<Path>>(sys_block: P) -> Self {
        Self {
            sys_block: sys_block.as_ref().to_path_buf(),
            cpu_count: num_cpus::get(),
        }
    }

    fn device_dir(&self, name: &str) -> PathBuf {
        self.sys_block.join(name)
    }

    fn read_string(&self, name: &str, attribute: &str) -> Result<String> {
        let path = self.device_dir(name).join(attribute);
        fs::read_to_string(&path)
            .map(|s| s.trim().to_string())
            .map_err(|e| Error::QueryFailed(format!("Failed to read {}: {}", path.display(), e)))
    }

    fn read_u64(&self, name: &str, attribute: &str) -> Result<u64> {
        self.read_string(name, attribute)?
            .parse()
            .map_err(|e| Error::Parse(format!("Failed to parse {}: {}", attribute, e)))
    }

    fn iostats_path(&self, name: &str) -> PathBuf {
        self.device_dir(name).join("queue/iostats")
    }

    /// Write `queue/iostats` of every disk, failing if any write fails
    fn write_iostats(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "1" } else { "0" };
        let mut failed = Vec::new();

        for name in self.list_disks()? {
            let path = self.iostats_path(&name);
            match fs::write(&path, value) {
                Ok(()) => debug!("Set {} = {}", path.display(), value),
                Err(e) => {
                    warn!("Failed to write {}: {}", path.display(), e);
                    failed.push(name);
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::QueryFailed(format!(
                "Failed to set queue/iostats on {}",
                failed.join(", ")
            )))
        }
    }
}

impl Default for LinuxDiskSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Loop devices, ram disks and device-mapper nodes are not physical disks
fn is_virtual_block_device(name: &str) -> bool {
    name.starts_with("loop") || name.starts_with("ram") || name.starts_with("dm-")
}

impl DiskStatsSource for LinuxDiskSource {
    fn list_disks(&self) -> Result<Vec<String>> {
        if !self.sys_block.exists() {
            return Err(Error::NoDevicesFound);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.sys_block).map_err(|e| {
            Error::QueryFailed(format!(
                "Failed to read {}: {}",
                self.sys_block.display(),
                e
            ))
        })? {
            let entry =
                entry.map_err(|e| Error::QueryFailed(format!("Failed to read entry: {}", e)))?;
            let name = entry.file_name().to_string_lossy().to_string();

            if is_virtual_block_device(&name) {
                continue;
            }
            names.push(name);
        }

        // read_dir order is unspecified
        names.sort();
        Ok(names)
    }

    fn query_disk(&self, name: &str) -> Result<Option<RawDiskCounters>> {
        if !self.device_dir(name).exists() {
            return Ok(None);
        }

        let stat = BlockStat::parse(&self.read_string(name, "stat")?)?;
        let size_sectors = self.read_u64(name, "size").unwrap_or(0);

        Ok(Some(stat.to_raw(size_sectors)))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            extended: true,
            tick_ratio: MS_TICK_RATIO,
            cpu_count: self.cpu_count,
        }
    }

    fn io_accounting(&self) -> Result<bool> {
        let names = self.list_disks()?;
        let mut enabled = true;
        for name in &names {
            let value = self.read_string(name, "queue/iostats")?;
            enabled &= value == "1";
        }
        Ok(enabled)
    }

    fn set_io_accounting(&self, enabled: bool) -> Result<()> {
        if !nix::unistd::geteuid().is_root() {
            return Err(Error::PermissionDenied(
                "Toggling queue/iostats requires root".to_string(),
            ));
        }

        self.write_iostats(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT_LINE: &str =
        "    4821      112   391034     2210     9932     5521   833200    14400        3    10250    16610        0        0        0        0";

    fn fixture_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "diskmon-linux-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn add_device(root: &Path, name: &str, stat: &str, size: &str) {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("queue")).unwrap();
        fs::write(dir.join("stat"), stat).unwrap();
        fs::write(dir.join("size"), size).unwrap();
        fs::write(dir.join("queue/iostats"), "1\n").unwrap();
    }

    #[test]
    fn test_parse_block_stat() {
        let stat = BlockStat::parse(STAT_LINE).unwrap();
        assert_eq!(stat.read_ios, 4821);
        assert_eq!(stat.read_sectors, 391034);
        assert_eq!(stat.read_ticks_ms, 2210);
        assert_eq!(stat.write_ios, 9932);
        assert_eq!(stat.write_sectors, 833200);
        assert_eq!(stat.write_ticks_ms, 14400);
        assert_eq!(stat.in_flight, 3);
        assert_eq!(stat.io_ticks_ms, 10250);
        assert_eq!(stat.time_in_queue_ms, 16610);
    }

    #[test]
    fn test_parse_rejects_short_stat() {
        assert!(matches!(BlockStat::parse("1 2 3"), Err(Error::Parse(_))));
        assert!(matches!(
            BlockStat::parse("1 2 x 4 5 6 7 8 9 10 11"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_to_raw_mapping() {
        let stat = BlockStat::parse(STAT_LINE).unwrap();
        // 1 GiB in sectors
        let raw = stat.to_raw(2_097_152);
        assert_eq!(raw.size, 1024);
        assert_eq!(raw.bsize, 512);
        assert_eq!(raw.xfers, 4821 + 9932);
        assert_eq!(raw.xrate, 4821);
        assert_eq!(raw.rblks, 391034);
        assert_eq!(raw.wblks, 833200);
        assert_eq!(raw.time, 1025);
        assert_eq!(raw.wq_time, 16610);
        assert_eq!(raw.free, 0);
    }

    #[test]
    fn test_list_and_query_fixture() {
        let root = fixture_root("list");
        add_device(&root, "sdb", STAT_LINE, "2097152\n");
        add_device(&root, "sda", STAT_LINE, "4194304\n");
        add_device(&root, "loop0", STAT_LINE, "0\n");
        add_device(&root, "dm-0", STAT_LINE, "0\n");

        let source = LinuxDiskSource::with_root(&root);
        assert_eq!(source.list_disks().unwrap(), vec!["sda", "sdb"]);

        let raw = source.query_disk("sda").unwrap().unwrap();
        assert_eq!(raw.size, 2048);
        assert!(source.query_disk("nvme9n1").unwrap().is_none());
        assert!(source.io_accounting().unwrap());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_missing_root_reports_no_devices() {
        let source = LinuxDiskSource::with_root("/nonexistent/diskmon/sys/block");
        assert!(matches!(source.list_disks(), Err(Error::NoDevicesFound)));
    }

    #[test]
    fn test_iostats_write_failure_is_reported() {
        let root = fixture_root("iostats");
        add_device(&root, "sda", STAT_LINE, "2097152\n");
        add_device(&root, "sdb", STAT_LINE, "2097152\n");
        // A directory in place of the attribute makes the write fail
        let blocked = root.join("sdb/queue/iostats");
        fs::remove_file(&blocked).unwrap();
        fs::create_dir_all(&blocked).unwrap();

        let source = LinuxDiskSource::with_root(&root);
        let err = source.write_iostats(false).unwrap_err();
        assert!(matches!(err, Error::QueryFailed(ref msg) if msg.contains("sdb")));
        assert_eq!(
            fs::read_to_string(root.join("sda/queue/iostats")).unwrap(),
            "0"
        );

        let _ = fs::remove_dir_all(&root);
    }
}

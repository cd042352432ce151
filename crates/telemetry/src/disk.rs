// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Machine-wide disk throughput from `/proc/diskstats`.
//!
//! Counters are summed over whole physical devices only. Partitions,
//! loop/ram devices and device-mapper targets are skipped because their
//! traffic is already counted on the underlying disk.

use crate::thermal::read_sysfs_file;
use crate::TelemetryError;
use std::path::Path;
use std::time::Duration;

const DISKSTATS: &str = "/proc/diskstats";
/// `/proc/diskstats` always counts 512-byte sectors, whatever the device's block size.
const SECTOR_BYTES: u64 = 512;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Cumulative bytes read and written across all whole disks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl DiskCounters {
    pub fn read() -> Result<Self, TelemetryError> {
        let path = Path::new(DISKSTATS);
        let content = read_sysfs_file(path)?;
        Ok(Self::parse(&content))
    }

    /// Parses `/proc/diskstats` content.
    ///
    /// Format: `major minor name rd_ios rd_merges rd_sectors rd_ticks wr_ios wr_merges wr_sectors ...`
    pub(crate) fn parse(content: &str) -> Self {
        let mut totals = Self::default();
        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 10 || !is_whole_disk(parts[2]) {
                continue;
            }
            let sectors_read: u64 = parts[5].parse().unwrap_or(0);
            let sectors_written: u64 = parts[9].parse().unwrap_or(0);
            totals.read_bytes += sectors_read * SECTOR_BYTES;
            totals.write_bytes += sectors_written * SECTOR_BYTES;
        }
        totals
    }

    /// Read and write throughput in MB/s since `prev`.
    ///
    /// Returns zeros for a zero-length interval; counter wrap-around is
    /// treated as no traffic.
    pub fn throughput_since(&self, prev: &DiskCounters, elapsed: Duration) -> (f64, f64) {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return (0.0, 0.0);
        }
        let read = self.read_bytes.saturating_sub(prev.read_bytes) as f64 / BYTES_PER_MB / secs;
        let write = self.write_bytes.saturating_sub(prev.write_bytes) as f64 / BYTES_PER_MB / secs;
        (read, write)
    }
}

/// `true` for whole-disk device names (`sda`, `nvme0n1`, `mmcblk0`, `vdb`).
fn is_whole_disk(name: &str) -> bool {
    const VIRTUAL_PREFIXES: &[&str] = &["loop", "ram", "dm-", "zram", "sr"];
    if VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return false;
    }
    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        // Partitions look like nvme0n1p2 / mmcblk0p1.
        return match name.rfind('p') {
            Some(i) => {
                let suffix = &name[i + 1..];
                suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit())
            }
            None => true,
        };
    }
    !name.chars().last().is_some_and(|c| c.is_ascii_digit())
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! OS counters through `sysinfo`, for hosts without procfs (macOS, Windows).
//!
//! Produces the same [`MemoryInfo`] and [`DiskCounters`] values as the
//! procfs readers, so the collector computes rates the same way on every
//! platform.

use crate::{DiskCounters, MemoryInfo};
use sysinfo::{Disks, System};

/// A long-lived `sysinfo` handle.
///
/// CPU utilisation is measured between two refreshes, so one instance
/// must live across ticks. [`new`](Self::new) takes the baseline.
#[derive(Debug)]
pub struct HostCounters {
    system: System,
}

impl HostCounters {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }

    /// Whole-machine utilisation (0-100) since the previous call.
    pub fn cpu_percent(&mut self) -> Option<f64> {
        self.system.refresh_cpu_usage();
        if self.system.cpus().is_empty() {
            return None;
        }
        Some(f64::from(self.system.global_cpu_usage()).clamp(0.0, 100.0))
    }

    /// Mean current frequency across cores that report one, in MHz.
    pub fn frequency_mhz(&mut self) -> Option<f64> {
        self.system.refresh_cpu_frequency();
        let freqs: Vec<f64> = self
            .system
            .cpus()
            .iter()
            .map(|c| c.frequency())
            .filter(|&mhz| mhz > 0)
            .map(|mhz| mhz as f64)
            .collect();
        if freqs.is_empty() {
            None
        } else {
            Some(freqs.iter().sum::<f64>() / freqs.len() as f64)
        }
    }

    pub fn memory(&mut self) -> Option<MemoryInfo> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return None;
        }
        Some(MemoryInfo {
            total_bytes,
            available_bytes: self.system.available_memory().min(total_bytes),
        })
    }

    /// Cumulative bytes read and written, summed over every listed disk.
    pub fn disk_counters(&self) -> Option<DiskCounters> {
        let disks = Disks::new_with_refreshed_list();
        if disks.list().is_empty() {
            return None;
        }
        let mut totals = DiskCounters::default();
        for disk in disks.list() {
            let usage = disk.usage();
            totals.read_bytes = totals.read_bytes.saturating_add(usage.total_read_bytes);
            totals.write_bytes = totals.write_bytes.saturating_add(usage.total_written_bytes);
        }
        Some(totals)
    }
}

impl Default for HostCounters {
    fn default() -> Self {
        Self::new()
    }
}

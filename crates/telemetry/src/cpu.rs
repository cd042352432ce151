// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU utilisation and frequency.
//!
//! Utilisation is computed from two samples of the aggregate `cpu` line in
//! `/proc/stat`: the share of elapsed jiffies that were not idle. A single
//! sample carries no utilisation information; the collector keeps the
//! previous sample between ticks.

use crate::thermal::read_sysfs_file;
use crate::TelemetryError;
use std::path::Path;

const PROC_STAT: &str = "/proc/stat";
const CPUINFO: &str = "/proc/cpuinfo";
const CUR_FREQ: &str = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq";

/// Cumulative CPU time counters (in jiffies) from `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    /// Jiffies spent idle or waiting on I/O.
    pub idle: u64,
    /// All jiffies across user, nice, system, idle, iowait, irq, softirq, steal.
    pub total: u64,
}

impl CpuTimes {
    /// Reads the aggregate counters from `/proc/stat`.
    pub fn read() -> Result<Self, TelemetryError> {
        let path = Path::new(PROC_STAT);
        let content = read_sysfs_file(path)?;
        Self::parse(&content, path)
    }

    /// Parses the first `cpu ` line of `/proc/stat`-formatted content.
    ///
    /// Format: `cpu  user nice system idle iowait irq softirq steal guest guest_nice`.
    /// Guest time is already included in user time and is not added again.
    pub(crate) fn parse(content: &str, source_path: &Path) -> Result<Self, TelemetryError> {
        let line = content
            .lines()
            .find(|l| l.starts_with("cpu "))
            .ok_or_else(|| TelemetryError::ParseError {
                path: source_path.display().to_string(),
                detail: "aggregate 'cpu' line not found".to_string(),
            })?;

        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|f| f.parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|e| TelemetryError::ParseError {
                path: source_path.display().to_string(),
                detail: format!("bad counter in '{line}': {e}"),
            })?;
        if fields.len() < 4 {
            return Err(TelemetryError::ParseError {
                path: source_path.display().to_string(),
                detail: format!("expected at least 4 counters, got {}", fields.len()),
            });
        }

        let iowait = fields.get(4).copied().unwrap_or(0);
        Ok(Self {
            idle: fields[3] + iowait,
            total: fields.iter().sum(),
        })
    }

    /// Busy percentage in `[0, 100]` over the interval since `prev`.
    pub fn utilisation_since(&self, prev: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(prev.total);
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle.saturating_sub(prev.idle).min(total);
        ((total - idle) as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Reads the current CPU frequency in MHz.
///
/// Tries cpufreq on core 0 first (reported in kHz), then the first
/// `cpu MHz` line of `/proc/cpuinfo` for machines without cpufreq (VMs).
pub fn read_frequency_mhz() -> Result<f64, TelemetryError> {
    let cur = Path::new(CUR_FREQ);
    if let Ok(content) = read_sysfs_file(cur) {
        let khz: u64 = content.parse().map_err(|_| TelemetryError::ParseError {
            path: cur.display().to_string(),
            detail: format!("expected integer kHz value, got '{content}'"),
        })?;
        return Ok((khz / 1000) as f64);
    }

    let path = Path::new(CPUINFO);
    let content = read_sysfs_file(path)?;
    parse_cpuinfo_mhz(&content).ok_or_else(|| TelemetryError::ParseError {
        path: path.display().to_string(),
        detail: "no 'cpu MHz' line".to_string(),
    })
}

fn parse_cpuinfo_mhz(content: &str) -> Option<f64> {
    content
        .lines()
        .filter(|l| l.starts_with("cpu MHz"))
        .find_map(|l| l.split(':').nth(1)?.trim().parse::<f64>().ok())
        .map(f64::round)
}

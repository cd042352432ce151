// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-tick telemetry record.
//!
//! A [`TelemetrySnapshot`] is built in full by the collector and then
//! published as a unit; nothing mutates a published snapshot. Optional
//! fields are `None` when the owning reader or probe is unsupported or
//! failed on that tick.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A complete point-in-time telemetry reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Machine-wide CPU utilisation over the last interval, in percent.
    pub cpu_percent: f64,
    /// CPU package temperature in °C.
    pub cpu_temp: Option<f64>,
    /// Current CPU frequency in MHz.
    pub cpu_freq: Option<f64>,
    pub cpu_power_w: Option<f64>,
    pub gpu_percent: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub gpu_power_w: Option<f64>,
    pub mem_total_gb: f64,
    pub mem_used_gb: f64,
    /// Disk read throughput over the last interval, in MB/s.
    pub io_read_mb_s: f64,
    /// Disk write throughput over the last interval, in MB/s.
    pub io_write_mb_s: f64,
    /// Name of the platform probe that supplied the GPU fields, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,
    /// Sequence number of the tick that produced this snapshot; 0 before
    /// the first tick.
    #[serde(default)]
    pub tick: u64,
    /// Unix timestamp in milliseconds when the snapshot was assembled.
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl TelemetrySnapshot {
    /// `true` until the sampler has completed a tick.
    pub fn is_initial(&self) -> bool {
        self.tick == 0
    }

    pub(crate) fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// One-line summary for logging or a live status line.
    ///
    /// # Example output
    /// ```text
    /// CPU 87% 61.0°C 3400 MHz | GPU 42% 48.0°C | Mem 9.1/15.5 GB | IO R 120.4 W 88.0 MB/s
    /// ```
    pub fn summary(&self) -> String {
        let mut cpu = format!("CPU {:.0}%", self.cpu_percent);
        if let Some(t) = self.cpu_temp {
            cpu.push_str(&format!(" {t:.1}°C"));
        }
        if let Some(f) = self.cpu_freq {
            cpu.push_str(&format!(" {f:.0} MHz"));
        }
        if let Some(w) = self.cpu_power_w {
            cpu.push_str(&format!(" {w:.1} W"));
        }

        let gpu = match (self.gpu_percent, self.gpu_temp) {
            (None, None) => "GPU n/a".to_string(),
            (p, t) => {
                let mut s = "GPU".to_string();
                if let Some(p) = p {
                    s.push_str(&format!(" {p:.0}%"));
                }
                if let Some(t) = t {
                    s.push_str(&format!(" {t:.1}°C"));
                }
                s
            }
        };

        format!(
            "{cpu} | {gpu} | Mem {:.1}/{:.1} GB | IO R {:.1} W {:.1} MB/s",
            self.mem_used_gb, self.mem_total_gb, self.io_read_mb_s, self.io_write_mb_s,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_initial_and_empty() {
        let s = TelemetrySnapshot::default();
        assert!(s.is_initial());
        assert_eq!(s.cpu_percent, 0.0);
        assert!(s.cpu_temp.is_none());
        assert!(s.gpu_percent.is_none());
        assert_eq!(s.summary(), "CPU 0% | GPU n/a | Mem 0.0/0.0 GB | IO R 0.0 W 0.0 MB/s");
    }

    #[test]
    fn test_summary_with_values() {
        let s = TelemetrySnapshot {
            cpu_percent: 87.2,
            cpu_temp: Some(61.0),
            cpu_freq: Some(3400.0),
            gpu_percent: Some(42.0),
            mem_total_gb: 15.5,
            mem_used_gb: 9.1,
            io_read_mb_s: 120.4,
            io_write_mb_s: 88.0,
            tick: 3,
            ..Default::default()
        };
        let line = s.summary();
        assert!(line.starts_with("CPU 87% 61.0°C 3400 MHz"));
        assert!(line.contains("GPU 42%"));
        assert!(line.contains("Mem 9.1/15.5 GB"));
        assert!(!s.is_initial());
    }

    #[test]
    fn test_unavailable_fields_serialise_as_null() {
        let json = serde_json::to_value(TelemetrySnapshot::default()).unwrap();
        assert!(json["gpu_temp"].is_null());
        assert!(json["cpu_temp"].is_null());
        assert_eq!(json["cpu_percent"], 0.0);
        assert!(json.get("probe").is_none());
    }

    #[test]
    fn test_deserialise_without_bookkeeping_fields() {
        let json = r#"{"cpu_percent": 50.0, "cpu_temp": 55.5, "cpu_freq": null,
            "cpu_power_w": null, "gpu_percent": null, "gpu_temp": null,
            "gpu_power_w": null, "mem_total_gb": 8.0, "mem_used_gb": 2.0,
            "io_read_mb_s": 0.0, "io_write_mb_s": 0.0}"#;
        let s: TelemetrySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(s.cpu_temp, Some(55.5));
        assert_eq!(s.tick, 0);
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU temperature via `/sys/class/thermal/`.
//!
//! Each `thermal_zoneN` directory carries a `type` (e.g. `x86_pkg_temp`,
//! `cpu-thermal`, `acpitz`) and a `temp` in millidegrees Celsius. The zone
//! whose type names the CPU package is preferred; zone 0 is the fallback
//! because on most SoCs it is the CPU.

use crate::TelemetryError;
use std::path::{Path, PathBuf};

/// Default sysfs directory holding the thermal zones.
const THERMAL_BASE: &str = "/sys/class/thermal";

/// Zone types that identify the CPU package, most specific first.
const CPU_ZONE_TYPES: &[&str] = &[
    "x86_pkg_temp",
    "cpu-thermal",
    "cpu_thermal",
    "k10temp",
    "soc_thermal",
    "acpitz",
];

/// Reads the CPU temperature in degrees Celsius.
pub fn read_cpu_temperature() -> Result<f64, TelemetryError> {
    read_cpu_temperature_in(Path::new(THERMAL_BASE))
}

pub(crate) fn read_cpu_temperature_in(base: &Path) -> Result<f64, TelemetryError> {
    let zone = find_cpu_zone(base).ok_or_else(|| TelemetryError::NotAvailable {
        path: base.join("thermal_zone*/temp").display().to_string(),
    })?;
    read_millidegrees(&zone.join("temp"))
}

/// Picks the zone directory whose `type` best matches the CPU package.
fn find_cpu_zone(base: &Path) -> Option<PathBuf> {
    let mut zones: Vec<(String, PathBuf)> = std::fs::read_dir(base)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("thermal_zone"))
        .map(|e| {
            let dir = e.path();
            let kind = read_sysfs_file(&dir.join("type")).unwrap_or_default();
            (kind, dir)
        })
        .collect();
    zones.sort_by(|a, b| a.1.cmp(&b.1));

    for wanted in CPU_ZONE_TYPES {
        if let Some((_, dir)) = zones.iter().find(|(kind, _)| kind == wanted) {
            return Some(dir.clone());
        }
    }
    let zone0 = base.join("thermal_zone0");
    zone0.join("temp").exists().then_some(zone0)
}

/// Parses a sysfs millidegree reading (e.g. `54321` → 54.321 °C).
fn read_millidegrees(path: &Path) -> Result<f64, TelemetryError> {
    let content = read_sysfs_file(path)?;
    let millidegrees: i64 = content.parse().map_err(|_| TelemetryError::ParseError {
        path: path.display().to_string(),
        detail: format!("expected integer millidegrees, got '{content}'"),
    })?;
    Ok(millidegrees as f64 / 1000.0)
}

/// Reads a sysfs/procfs file and returns its trimmed content.
///
/// Shared by the other readers in this crate.
pub(crate) fn read_sysfs_file(path: &Path) -> Result<String, TelemetryError> {
    if !path.exists() {
        return Err(TelemetryError::NotAvailable {
            path: path.display().to_string(),
        });
    }
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| TelemetryError::ReadError {
            path: path.display().to_string(),
            source: e,
        })
}

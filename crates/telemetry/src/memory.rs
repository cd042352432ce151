// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! System memory via `/proc/meminfo`.

use crate::TelemetryError;
use std::path::Path;

const MEMINFO_PATH: &str = "/proc/meminfo";
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// System memory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MemoryInfo {
    /// Total physical memory in bytes.
    pub total_bytes: u64,
    /// Memory the kernel reports as available to new allocations, in bytes.
    pub available_bytes: u64,
}

impl MemoryInfo {
    /// Reads current memory information from `/proc/meminfo`.
    pub fn read() -> Result<Self, TelemetryError> {
        Self::read_from(Path::new(MEMINFO_PATH))
    }

    pub(crate) fn read_from(path: &Path) -> Result<Self, TelemetryError> {
        let content = std::fs::read_to_string(path).map_err(|e| TelemetryError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parses `/proc/meminfo`-formatted content (values in kB).
    ///
    /// Kernels older than 3.14 lack `MemAvailable`; `MemFree` stands in.
    pub(crate) fn parse(content: &str, source_path: &Path) -> Result<Self, TelemetryError> {
        let mut total_kb = None;
        let mut available_kb = None;
        let mut free_kb = None;

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let slot = match key {
                "MemTotal:" => &mut total_kb,
                "MemAvailable:" => &mut available_kb,
                "MemFree:" => &mut free_kb,
                _ => continue,
            };
            *slot = Some(value.parse::<u64>().map_err(|_| TelemetryError::ParseError {
                path: source_path.display().to_string(),
                detail: format!("expected integer kB value for {key}, got '{value}'"),
            })?);
        }

        let total_kb = total_kb.ok_or_else(|| TelemetryError::ParseError {
            path: source_path.display().to_string(),
            detail: "MemTotal not found".to_string(),
        })?;
        let available_kb =
            available_kb
                .or(free_kb)
                .ok_or_else(|| TelemetryError::ParseError {
                    path: source_path.display().to_string(),
                    detail: "neither MemAvailable nor MemFree found".to_string(),
                })?;

        Ok(Self {
            total_bytes: total_kb * 1024,
            available_bytes: (available_kb * 1024).min(total_kb * 1024),
        })
    }

    /// Bytes in use (`total - available`).
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    pub fn total_gb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_GB
    }

    pub fn used_gb(&self) -> f64 {
        self.used_bytes() as f64 / BYTES_PER_GB
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU package power from the Linux powercap (RAPL) interface.
//!
//! `energy_uj` is a monotonically increasing energy counter in microjoules
//! that wraps at `max_energy_range_uj`. Average power over an interval is
//! the energy delta divided by the elapsed time. Recent kernels restrict
//! the counter to root, in which case the reading is simply unavailable.

use crate::thermal::read_sysfs_file;
use crate::TelemetryError;
use std::path::{Path, PathBuf};
use std::time::Duration;

const RAPL_PACKAGE: &str = "/sys/class/powercap/intel-rapl:0";

/// Reader for one RAPL energy domain.
#[derive(Debug, Clone)]
pub(crate) struct RaplDomain {
    dir: PathBuf,
}

impl RaplDomain {
    /// The CPU package domain.
    pub(crate) fn package() -> Self {
        Self::at(Path::new(RAPL_PACKAGE))
    }

    pub(crate) fn at(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Current cumulative energy in microjoules.
    pub(crate) fn energy_uj(&self) -> Result<u64, TelemetryError> {
        self.read_u64("energy_uj")
    }

    /// Average watts between two counter readings taken `elapsed` apart.
    pub(crate) fn watts_between(
        &self,
        prev_uj: u64,
        curr_uj: u64,
        elapsed: Duration,
    ) -> Option<f64> {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return None;
        }
        let delta = if curr_uj >= prev_uj {
            curr_uj - prev_uj
        } else {
            let range = self.read_u64("max_energy_range_uj").ok()?;
            range.saturating_sub(prev_uj) + curr_uj
        };
        Some(delta as f64 / 1_000_000.0 / secs)
    }

    fn read_u64(&self, file: &str) -> Result<u64, TelemetryError> {
        let path = self.dir.join(file);
        let content = read_sysfs_file(&path)?;
        content.parse().map_err(|_| TelemetryError::ParseError {
            path: path.display().to_string(),
            detail: format!("expected integer microjoules, got '{content}'"),
        })
    }
}

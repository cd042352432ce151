// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The fixed phase sequence of a session.

use std::fmt;
use std::time::Duration;

/// One step of a session. Phases run in [`Phase::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Cpu,
    Io,
    Mixed,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Cpu, Phase::Io, Phase::Mixed];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU Stress",
            Self::Io => "I/O Stress",
            Self::Mixed => "Mixed Thermal Sweep",
        }
    }

    /// Whole seconds of `total_s` given to this phase: CPU 1/2, I/O and
    /// mixed 1/4 each, rounded down.
    pub fn budget(&self, total_s: u64) -> Duration {
        let secs = match self {
            Self::Cpu => total_s / 2,
            Self::Io | Self::Mixed => total_s / 4,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

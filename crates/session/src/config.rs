// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Session configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! duration_s = 180
//! platform = "linux"
//! telemetry_level = "full"
//! sample_interval_ms = 1000
//! display_tick_ms = 500
//! probe_timeout_ms = 3000
//! join_timeout_ms = 1000
//! reports_dir = "reports"
//!
//! [kernels]
//! matrix_size = 512
//! fft_len = 1048576
//! prime_start = 1000000
//! prime_block = 5000
//! fallback_matrix_size = 256
//!
//! [io]
//! file_size_mb = 1024
//! block_size_kb = 1024
//! sync_writes = true
//! ```

use crate::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use stress::{IoConfig, KernelConfig};
use telemetry::Platform;

/// The three preset session lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationTier {
    Quick,
    Standard,
    Extended,
}

impl DurationTier {
    pub fn seconds(&self) -> u64 {
        match self {
            Self::Quick => 60,
            Self::Standard => 180,
            Self::Extended => 480,
        }
    }
}

impl Default for DurationTier {
    fn default() -> Self {
        Self::Standard
    }
}

impl fmt::Display for DurationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Extended => "extended",
        };
        write!(f, "{name} (~{} s)", self.seconds())
    }
}

impl FromStr for DurationTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" | "1" | "60" => Ok(Self::Quick),
            "standard" | "2" | "180" => Ok(Self::Standard),
            "extended" | "3" | "480" => Ok(Self::Extended),
            other => Err(format!(
                "unknown tier '{other}'; expected 'quick', 'standard', or 'extended'"
            )),
        }
    }
}

/// How much telemetry to collect and show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryLevel {
    /// OS counters, platform GPU/power probes and the live display.
    #[default]
    Full,
    /// OS counters only; no external probes, no live display.
    Minimal,
}

impl FromStr for TelemetryLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" | "1" => Ok(Self::Full),
            "minimal" | "2" => Ok(Self::Minimal),
            other => Err(format!(
                "unknown telemetry level '{other}'; expected 'full' or 'minimal'"
            )),
        }
    }
}

/// Configuration for one benchmark session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Total session length in seconds, split CPU 1/2, I/O 1/4, mixed 1/4.
    pub duration_s: u64,
    /// Platform whose telemetry probe chain is used.
    pub platform: Platform,
    pub telemetry_level: TelemetryLevel,
    /// Telemetry sampling interval.
    pub sample_interval_ms: u64,
    /// Live status refresh interval.
    pub display_tick_ms: u64,
    /// Upper bound on one external diagnostic invocation.
    pub probe_timeout_ms: u64,
    /// Total wait for the CPU workers on stop; the I/O runner and the mixed
    /// phase get twice this.
    pub join_timeout_ms: u64,
    /// Directory that receives the JSON and text reports.
    pub reports_dir: PathBuf,
    pub kernels: KernelConfig,
    pub io: IoConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_s: DurationTier::default().seconds(),
            platform: Platform::current(),
            telemetry_level: TelemetryLevel::Full,
            sample_interval_ms: 1000,
            display_tick_ms: 500,
            probe_timeout_ms: 3000,
            join_timeout_ms: 1000,
            reports_dir: PathBuf::from("reports"),
            kernels: KernelConfig::default(),
            io: IoConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SessionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SessionError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string. Missing keys take defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, SessionError> {
        toml::from_str(toml_str)
            .map_err(|e| SessionError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, SessionError> {
        toml::to_string_pretty(self)
            .map_err(|e| SessionError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Sets the duration from a preset tier.
    #[must_use]
    pub fn with_tier(mut self, tier: DurationTier) -> Self {
        self.duration_s = tier.seconds();
        self
    }

    /// Checks the invariants the runners rely on.
    pub fn validate(&self) -> Result<(), SessionError> {
        let fail = |msg: &str| Err(SessionError::ConfigError(msg.to_string()));
        if self.duration_s == 0 {
            return fail("duration_s must be greater than zero");
        }
        if self.sample_interval_ms == 0 || self.display_tick_ms == 0 {
            return fail("sample_interval_ms and display_tick_ms must be greater than zero");
        }
        if self.kernels.matrix_size == 0 || self.kernels.fallback_matrix_size == 0 {
            return fail("matrix sizes must be greater than zero");
        }
        if !self.kernels.fft_len.is_power_of_two() {
            return Err(SessionError::ConfigError(format!(
                "fft_len must be a power of two, got {}",
                self.kernels.fft_len
            )));
        }
        if self.kernels.prime_block == 0 {
            return fail("prime_block must be greater than zero");
        }
        if self.io.file_size_mb == 0 || self.io.block_size_kb == 0 {
            return fail("io.file_size_mb and io.block_size_kb must be greater than zero");
        }
        Ok(())
    }

    pub fn total_duration(&self) -> Duration {
        Duration::from_secs(self.duration_s)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn display_tick(&self) -> Duration {
        Duration::from_millis(self.display_tick_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = SessionConfig::default();
        assert_eq!(c.duration_s, 180);
        assert_eq!(c.telemetry_level, TelemetryLevel::Full);
        assert_eq!(c.kernels.fft_len, 1 << 20);
        assert_eq!(c.io.file_size_mb, 1024);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_tiers() {
        assert_eq!("quick".parse::<DurationTier>().unwrap().seconds(), 60);
        assert_eq!("2".parse::<DurationTier>().unwrap().seconds(), 180);
        assert_eq!("Extended".parse::<DurationTier>().unwrap().seconds(), 480);
        assert!("forever".parse::<DurationTier>().is_err());
        let c = SessionConfig::default().with_tier(DurationTier::Quick);
        assert_eq!(c.duration_s, 60);
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
duration_s = 60
platform = "macos"
telemetry_level = "minimal"

[io]
file_size_mb = 64
"#;
        let c = SessionConfig::from_toml(toml).unwrap();
        assert_eq!(c.duration_s, 60);
        assert_eq!(c.platform, Platform::Macos);
        assert_eq!(c.telemetry_level, TelemetryLevel::Minimal);
        assert_eq!(c.io.file_size_mb, 64);
        assert_eq!(c.io.block_size_kb, 1024);
        assert_eq!(c.kernels.matrix_size, 512);
        assert_eq!(c.reports_dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = SessionConfig {
            duration_s: 480,
            platform: Platform::Windows,
            ..Default::default()
        };
        let toml = c.to_toml().unwrap();
        let back = SessionConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            SessionConfig::from_toml("duration_s = \"long\""),
            Err(SessionError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let c = SessionConfig {
            duration_s: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_fft_len() {
        let mut c = SessionConfig::default();
        c.kernels.fft_len = 1000;
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("power of two"));
    }

    #[test]
    fn test_from_missing_file() {
        let result = SessionConfig::from_file(Path::new("/nonexistent/chronos.toml"));
        assert!(matches!(result, Err(SessionError::ConfigError(_))));
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # telemetry
//!
//! Samples platform telemetry while the stress runners are busy and
//! publishes it as whole-record [`TelemetrySnapshot`]s.
//!
//! # Sources
//! - **CPU utilisation**: `/proc/stat` jiffy deltas between ticks.
//! - **CPU frequency**: cpufreq `scaling_cur_freq`, then `/proc/cpuinfo`.
//! - **CPU temperature**: the CPU package thermal zone.
//! - **CPU power**: RAPL `energy_uj` deltas.
//! - **Memory**: `/proc/meminfo`.
//! - **Disk throughput**: `/proc/diskstats` sector deltas.
//!
//! Hosts without procfs (macOS, Windows) read utilisation, frequency,
//! memory and disk counters through `sysinfo` ([`HostCounters`]).
//! - **GPU utilisation / temperature / power**: a per-platform chain of
//!   external diagnostic probes (see [`ProbeKind::chain`]).
//!
//! # Graceful Degradation
//! Nothing here is fatal. A reader that fails leaves its field `None` (or
//! zero for the always-present counters) for that tick; values are never
//! guessed and never carried over from a previous tick.
//!
//! # Example
//! ```no_run
//! use telemetry::{SamplerConfig, TelemetrySampler};
//!
//! # async fn example() -> Result<(), telemetry::TelemetryError> {
//! let mut sampler = TelemetrySampler::new(SamplerConfig::default());
//! sampler.start()?;
//! tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//! println!("{}", sampler.latest_snapshot().summary());
//! sampler.stop().await;
//! # Ok(())
//! # }
//! ```

mod collector;
mod cpu;
mod disk;
mod error;
mod host;
mod memory;
mod platform;
mod power;
mod probe;
mod sampler;
mod snapshot;
pub(crate) mod thermal;

pub use collector::TelemetryCollector;
pub use cpu::{read_frequency_mhz, CpuTimes};
pub use disk::DiskCounters;
pub use error::TelemetryError;
pub use host::HostCounters;
pub use memory::MemoryInfo;
pub use platform::Platform;
pub use probe::{probe_chain, run_diagnostic, ProbeKind, ProbeReading};
pub use sampler::{SamplerConfig, TelemetrySampler};
pub use snapshot::TelemetrySnapshot;
pub use thermal::read_cpu_temperature;

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! One sampling tick.
//!
//! The collector owns the raw counters from the previous tick (CPU jiffies,
//! disk sectors, RAPL energy) so that rates can be computed as deltas. It
//! is driven by [`TelemetrySampler`](crate::TelemetrySampler) but can be
//! used on its own for one-off readings.
//!
//! CPU, memory and disk counters come from procfs where it is readable and
//! from [`HostCounters`] (`sysinfo`) everywhere else.

use crate::power::RaplDomain;
use crate::{
    probe_chain, read_cpu_temperature, read_frequency_mhz, CpuTimes, DiskCounters, HostCounters,
    MemoryInfo, Platform, TelemetrySnapshot,
};
use std::time::{Duration, Instant};

/// Builds full [`TelemetrySnapshot`]s from OS counters and platform probes.
#[derive(Debug)]
pub struct TelemetryCollector {
    platform: Platform,
    platform_probes: bool,
    probe_timeout: Duration,
    rapl: RaplDomain,
    /// Set when procfs is unreadable on this host.
    host: Option<HostCounters>,
    prev_cpu: Option<CpuTimes>,
    prev_disk: Option<(DiskCounters, Instant)>,
    prev_energy: Option<(u64, Instant)>,
    ticks: u64,
}

impl TelemetryCollector {
    /// Creates a collector and records baseline counters, so the first
    /// [`collect`](Self::collect) already reports rates.
    ///
    /// With `platform_probes` off, the external GPU/power probes are never
    /// invoked and their fields stay `None`.
    pub fn new(platform: Platform, platform_probes: bool, probe_timeout: Duration) -> Self {
        let prev_cpu = CpuTimes::read().ok();
        let host = if prev_cpu.is_some() {
            None
        } else {
            tracing::debug!("procfs unavailable; reading OS counters through sysinfo");
            Some(HostCounters::new())
        };
        Self::with_counters(platform, platform_probes, probe_timeout, prev_cpu, host)
    }

    /// A collector that reads CPU, memory and disk through `sysinfo` even
    /// where procfs exists.
    pub fn with_host_counters(
        platform: Platform,
        platform_probes: bool,
        probe_timeout: Duration,
    ) -> Self {
        Self::with_counters(
            platform,
            platform_probes,
            probe_timeout,
            None,
            Some(HostCounters::new()),
        )
    }

    fn with_counters(
        platform: Platform,
        platform_probes: bool,
        probe_timeout: Duration,
        prev_cpu: Option<CpuTimes>,
        host: Option<HostCounters>,
    ) -> Self {
        let rapl = RaplDomain::package();
        let now = Instant::now();
        let disk = match &host {
            Some(host) => host.disk_counters(),
            None => DiskCounters::read().ok(),
        };
        Self {
            platform,
            platform_probes,
            probe_timeout,
            prev_cpu,
            prev_disk: disk.map(|c| (c, now)),
            prev_energy: rapl.energy_uj().ok().map(|e| (e, now)),
            rapl,
            host,
            ticks: 0,
        }
    }

    /// `true` when OS counters come from `sysinfo` rather than procfs.
    pub fn uses_host_counters(&self) -> bool {
        self.host.is_some()
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Reads every source once and assembles a snapshot.
    ///
    /// Never fails: each unreadable source leaves its field at zero or `None`.
    pub async fn collect(&mut self) -> TelemetrySnapshot {
        self.ticks += 1;
        let mut snap = TelemetrySnapshot {
            tick: self.ticks,
            ..Default::default()
        };

        match self.host.as_mut() {
            Some(host) => {
                match host.cpu_percent() {
                    Some(pct) => snap.cpu_percent = pct,
                    None => tracing::debug!("cpu utilisation unavailable"),
                }
                snap.cpu_freq = host.frequency_mhz();
            }
            None => {
                match CpuTimes::read() {
                    Ok(curr) => {
                        if let Some(prev) = self.prev_cpu {
                            snap.cpu_percent = curr.utilisation_since(&prev);
                        }
                        self.prev_cpu = Some(curr);
                    }
                    Err(e) => tracing::debug!(error = %e, "cpu utilisation unavailable"),
                }
                snap.cpu_freq = read_frequency_mhz().ok();
            }
        }
        snap.cpu_temp = read_cpu_temperature().ok();
        snap.cpu_power_w = self.rapl_watts();

        let memory = match self.host.as_mut() {
            Some(host) => host.memory().ok_or_else(|| "sysinfo reported no memory".to_string()),
            None => MemoryInfo::read().map_err(|e| e.to_string()),
        };
        match memory {
            Ok(mem) => {
                snap.mem_total_gb = mem.total_gb();
                snap.mem_used_gb = mem.used_gb();
            }
            Err(e) => tracing::debug!(error = %e, "memory info unavailable"),
        }

        let disk = match &self.host {
            Some(host) => host.disk_counters(),
            None => DiskCounters::read().ok(),
        };
        if let Some(curr) = disk {
            let now = Instant::now();
            if let Some((prev, at)) = self.prev_disk {
                let (r, w) = curr.throughput_since(&prev, now.duration_since(at));
                snap.io_read_mb_s = r;
                snap.io_write_mb_s = w;
            }
            self.prev_disk = Some((curr, now));
        }

        if self.platform_probes {
            if let Some((kind, reading)) = probe_chain(self.platform, self.probe_timeout).await {
                snap.gpu_percent = reading.gpu_percent;
                snap.gpu_temp = reading.gpu_temp;
                snap.gpu_power_w = reading.gpu_power_w;
                snap.cpu_temp = snap.cpu_temp.or(reading.cpu_temp);
                snap.cpu_power_w = snap.cpu_power_w.or(reading.cpu_power_w);
                snap.probe = Some(kind.name().to_string());
            }
        }

        snap.timestamp_ms = TelemetrySnapshot::now_ms();
        tracing::trace!(tick = snap.tick, summary = %snap.summary(), "telemetry tick");
        snap
    }

    fn rapl_watts(&mut self) -> Option<f64> {
        let curr = self.rapl.energy_uj().ok()?;
        let now = Instant::now();
        let watts = self
            .prev_energy
            .and_then(|(prev, at)| self.rapl.watts_between(prev, curr, now.duration_since(at)));
        self.prev_energy = Some((curr, now));
        watts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[tokio::test]
    async fn test_collect_without_probes() {
        let mut c = TelemetryCollector::new(Platform::current(), false, Duration::from_secs(1));
        let first = c.collect().await;
        let second = c.collect().await;

        assert_eq!(first.tick, 1);
        assert_eq!(second.tick, 2);
        assert!(second.gpu_percent.is_none());
        assert!(second.probe.is_none());
        assert!((0.0..=100.0).contains(&second.cpu_percent));
        assert!(second.io_read_mb_s.is_finite() && second.io_read_mb_s >= 0.0);
        assert!(second.timestamp_ms > 0);
    }

    #[tokio::test]
    async fn test_failed_probe_chain_leaves_gpu_fields_null() {
        // powermetrics and ioreg only exist on macOS.
        if cfg!(target_os = "macos") {
            return;
        }
        let mut c = TelemetryCollector::new(Platform::Macos, true, Duration::from_millis(500));
        for _ in 0..2 {
            let snap = c.collect().await;
            assert!(snap.probe.is_none());
            assert!(snap.gpu_percent.is_none());
            assert!(snap.gpu_temp.is_none());
            assert!(snap.gpu_power_w.is_none());
        }
    }

    #[tokio::test]
    async fn test_host_counters_populate_cpu_and_memory() {
        let mut c =
            TelemetryCollector::with_host_counters(Platform::current(), false, Duration::from_secs(1));
        assert!(c.uses_host_counters());
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        let snap = c.collect().await;

        assert!((0.0..=100.0).contains(&snap.cpu_percent));
        assert!(snap.mem_total_gb > 0.0);
        assert!(snap.mem_used_gb > 0.0 && snap.mem_used_gb <= snap.mem_total_gb);
        assert!(snap.io_read_mb_s >= 0.0 && snap.io_write_mb_s >= 0.0);
        assert!(snap.probe.is_none());
    }

    #[tokio::test]
    async fn test_procfs_selected_when_readable() {
        let c = TelemetryCollector::new(Platform::current(), false, Duration::from_secs(1));
        assert_eq!(c.uses_host_counters(), !Path::new("/proc/stat").exists());
    }

    #[tokio::test]
    async fn test_memory_populated_on_linux() {
        if Path::new("/proc/meminfo").exists() {
            let mut c = TelemetryCollector::new(Platform::Linux, false, Duration::from_secs(1));
            let snap = c.collect().await;
            assert!(snap.mem_total_gb > 0.0);
            assert!(snap.mem_used_gb <= snap.mem_total_gb);
        }
    }
}

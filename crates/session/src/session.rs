// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The benchmark session: telemetry, three timed phases, one report.

use crate::{
    CancelToken, LiveStatus, Phase, ReportSink, SessionConfig, SessionError, SessionObserver,
    TelemetryLevel,
};
use scoring::{BenchResults, Report, ReportMeta};
use std::time::{Duration, Instant};
use stress::{
    AcceleratorComputeRunner, AcceleratorConfig, CpuStressRunner, IoStressRunner,
    MixedLoadCoordinator, StressRunner,
};
use telemetry::{SamplerConfig, TelemetrySampler};
use tokio::time::MissedTickBehavior;

/// Runs one benchmark session.
///
/// Must be driven on a multi-threaded Tokio runtime: stopping a runner
/// joins its threads under `block_in_place`.
pub struct BenchmarkSession {
    config: SessionConfig,
    cancel: CancelToken,
    /// Worker count for unit tests; sessions otherwise use every
    /// processing unit.
    processing_units: Option<usize>,
}

impl BenchmarkSession {
    /// Validates `config` and prepares a session.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
            processing_units: None,
        })
    }

    #[cfg(test)]
    fn with_processing_units(mut self, units: usize) -> Self {
        self.processing_units = Some(units);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A handle that cancels this session from anywhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs every phase, assembles the report and hands it to `sink`.
    ///
    /// Cancellation stops the active phase and skips the rest; the report
    /// still covers whatever ran. A sink failure is logged and the report
    /// is returned anyway. Only a telemetry start failure is an error.
    pub async fn run(
        &self,
        observer: &mut dyn SessionObserver,
        sink: &mut dyn ReportSink,
    ) -> Result<Report, SessionError> {
        let started = Instant::now();
        let live = self.config.telemetry_level == TelemetryLevel::Full;
        tracing::info!(
            duration_s = self.config.duration_s,
            platform = %self.config.platform,
            live,
            "Starting benchmark session"
        );

        let mut sampler = TelemetrySampler::new(self.sampler_config());
        sampler.start()?;

        let mut results = BenchResults::default();
        let mut clock = PhaseClock {
            started,
            sampler: &sampler,
            observer,
            live,
        };

        for phase in Phase::ALL {
            if self.cancel.is_cancelled() {
                tracing::info!(phase = %phase, "Skipping phase after cancellation");
                continue;
            }
            let budget = phase.budget(self.config.duration_s);
            if budget.is_zero() {
                tracing::info!(phase = %phase, "Skipping phase with no time budget");
                continue;
            }
            match phase {
                Phase::Cpu => {
                    results.cpu = self.drive(phase, self.cpu_runner(), budget, &mut clock).await;
                }
                Phase::Io => {
                    results.io = self.drive(phase, self.io_runner(), budget, &mut clock).await;
                }
                Phase::Mixed => {
                    let mixed = MixedLoadCoordinator::new(
                        self.cpu_runner(),
                        self.io_runner(),
                        AcceleratorComputeRunner::new(AcceleratorConfig {
                            fallback_matrix_size: self.config.kernels.fallback_matrix_size,
                            ..Default::default()
                        }),
                    )
                    .with_join_timeout(self.config.join_timeout() * 2);
                    results.mixed = self.drive(phase, mixed, budget, &mut clock).await;
                }
            }
        }

        sampler.stop().await;
        let last = sampler.latest_snapshot();
        results.telemetry = (!last.is_initial()).then_some(last);

        let cancelled = self.cancel.is_cancelled();
        let meta = ReportMeta::now(
            self.config.platform,
            env!("CARGO_PKG_VERSION"),
            self.config.duration_s,
            cancelled,
        );
        let report = Report::assemble(meta, results);
        tracing::info!(
            composite = report.scores().composite,
            cancelled,
            elapsed_s = started.elapsed().as_secs_f64(),
            "Benchmark session finished"
        );

        if let Err(e) = sink.deliver(&report) {
            tracing::warn!(error = %e, "Report sink failed");
        }
        Ok(report)
    }

    /// Starts `runner`, pumps the display until the budget is spent or the
    /// session is cancelled, then stops it and reads its result.
    ///
    /// Returns `None` when the runner fails to start.
    async fn drive<R>(
        &self,
        phase: Phase,
        mut runner: R,
        budget: Duration,
        clock: &mut PhaseClock<'_>,
    ) -> Option<R::Output>
    where
        R: StressRunner,
    {
        tracing::info!(phase = %phase, budget_s = budget.as_secs(), "Phase started");
        if let Err(e) = runner.start(budget) {
            tracing::warn!(phase = %phase, runner = runner.name(), error = %e, "Phase skipped");
            return None;
        }
        clock.observer.phase_started(phase, budget);

        let phase_started = Instant::now();
        let deadline = tokio::time::sleep(budget);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(self.config.display_tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let cancelled = loop {
            tokio::select! {
                _ = &mut deadline => break false,
                _ = self.cancel.cancelled() => break true,
                _ = ticker.tick(), if clock.live => {
                    let status = LiveStatus {
                        phase,
                        subtest: runner.current_subtest(),
                        elapsed: clock.started.elapsed(),
                        total: self.config.total_duration(),
                        phase_elapsed: phase_started.elapsed(),
                        telemetry: clock.sampler.latest_snapshot(),
                    };
                    tracing::debug!(phase = %phase, subtest = %status.subtest, "Display tick");
                    clock.observer.tick(&status);
                }
            }
        };

        tokio::task::block_in_place(|| runner.stop());
        let output = runner.result();
        tracing::info!(
            phase = %phase,
            cancelled,
            elapsed_s = phase_started.elapsed().as_secs_f64(),
            "Phase finished"
        );
        clock.observer.phase_finished(phase, cancelled);
        Some(output)
    }

    fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: self.config.sample_interval(),
            platform: self.config.platform,
            platform_probes: self.config.telemetry_level == TelemetryLevel::Full,
            probe_timeout: self.config.probe_timeout(),
        }
    }

    fn cpu_runner(&self) -> CpuStressRunner {
        let kernels = self.config.kernels.clone();
        let runner = match self.processing_units {
            Some(units) => CpuStressRunner::with_processing_units(units, kernels),
            None => CpuStressRunner::new(kernels),
        };
        runner.with_join_timeout(self.config.join_timeout())
    }

    fn io_runner(&self) -> IoStressRunner {
        IoStressRunner::new(self.config.io.clone())
            .with_join_timeout(self.config.join_timeout() * 2)
    }
}

/// Session-wide state the display pump needs in every phase.
struct PhaseClock<'a> {
    started: Instant,
    sampler: &'a TelemetrySampler,
    observer: &'a mut dyn SessionObserver,
    live: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SessionConfig {
            duration_s: 0,
            ..Default::default()
        };
        assert!(matches!(
            BenchmarkSession::new(config),
            Err(SessionError::ConfigError(_))
        ));
    }

    #[test]
    fn test_sampler_follows_telemetry_level() {
        let config = SessionConfig {
            telemetry_level: TelemetryLevel::Minimal,
            sample_interval_ms: 250,
            ..Default::default()
        };
        let session = BenchmarkSession::new(config).unwrap();
        let sampler = session.sampler_config();
        assert!(!sampler.platform_probes);
        assert_eq!(sampler.interval.as_millis(), 250);
    }

    #[test]
    fn test_cpu_runner_uses_every_processing_unit() {
        let session = BenchmarkSession::new(SessionConfig::default()).unwrap();
        let detected = std::thread::available_parallelism().map_or(1, |n| n.get());
        assert_eq!(session.cpu_runner().processing_units(), detected);
    }

    #[test]
    fn test_worker_count_key_is_not_configurable() {
        let config = SessionConfig::from_toml("cpu_workers = 3\nduration_s = 60").unwrap();
        let session = BenchmarkSession::new(config).unwrap();
        let detected = std::thread::available_parallelism().map_or(1, |n| n.get());
        assert_eq!(session.cpu_runner().processing_units(), detected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_small_session_with_fixed_workers() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            duration_s: 2,
            telemetry_level: TelemetryLevel::Minimal,
            sample_interval_ms: 200,
            kernels: stress::KernelConfig {
                matrix_size: 32,
                fft_len: 1024,
                prime_start: 1000,
                prime_block: 100,
                fallback_matrix_size: 16,
            },
            reports_dir: dir.path().join("reports"),
            ..Default::default()
        };
        let session = BenchmarkSession::new(config).unwrap().with_processing_units(3);
        let report = session
            .run(&mut crate::NullObserver, &mut crate::ReportWriter::new(dir.path()))
            .await
            .unwrap();
        let cpu = report.results().cpu.as_ref().unwrap();
        assert_eq!(cpu.processes_used, 3);
        assert_eq!(cpu.workers.len(), 3);
    }
}

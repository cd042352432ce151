// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU, I/O and accelerator load at the same time.

use crate::accelerator::{detect, AcceleratorComputeRunner, AcceleratorSnapshot};
use crate::runner::{join_until, panic_message, validate_duration};
use crate::{CpuStressResult, CpuStressRunner, IoStressResult, IoStressRunner, StressError, StressRunner};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Label shown while no accelerator is running.
pub const CPU_IO_LABEL: &str = "Mixed: CPU+I/O";

/// Marker serialised as the string `"unavailable"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Unavailable,
}

/// The accelerator part of a mixed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GpuOutcome {
    Snapshot(AcceleratorSnapshot),
    Unavailable(Availability),
}

impl Default for GpuOutcome {
    fn default() -> Self {
        Self::Unavailable(Availability::Unavailable)
    }
}

impl GpuOutcome {
    /// Mean seconds per accelerator pass, for scoring.
    pub fn seconds_per_pass(&self) -> Option<f64> {
        match self {
            Self::Snapshot(s) => s.seconds_per_pass(),
            Self::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MixedLoadResult {
    pub cpu: CpuStressResult,
    pub io: IoStressResult,
    pub gpu: GpuOutcome,
}

/// Drives the CPU and I/O runners, plus the accelerator when one exists,
/// over one shared window.
pub struct MixedLoadCoordinator {
    cpu: CpuStressRunner,
    io: IoStressRunner,
    accelerator: AcceleratorComputeRunner,
    accelerator_stop: Arc<AtomicBool>,
    accelerator_thread: Option<JoinHandle<AcceleratorSnapshot>>,
    accelerator_used: bool,
    gpu: Option<AcceleratorSnapshot>,
    join_timeout: Duration,
}

impl MixedLoadCoordinator {
    pub fn new(
        cpu: CpuStressRunner,
        io: IoStressRunner,
        accelerator: AcceleratorComputeRunner,
    ) -> Self {
        Self {
            cpu,
            io,
            accelerator,
            accelerator_stop: Arc::new(AtomicBool::new(false)),
            accelerator_thread: None,
            accelerator_used: false,
            gpu: None,
            join_timeout: Duration::from_secs(1),
        }
    }

    /// Sets how long `stop` waits for every CPU, I/O and accelerator
    /// thread together.
    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    fn accelerator_active(&self) -> bool {
        self.accelerator_thread
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl StressRunner for MixedLoadCoordinator {
    type Output = MixedLoadResult;

    fn name(&self) -> &'static str {
        "mixed"
    }

    fn start(&mut self, duration: Duration) -> Result<(), StressError> {
        validate_duration(duration)?;
        tracing::info!(duration_s = duration.as_secs_f64(), "Starting mixed load");
        self.cpu.start(duration)?;
        self.io.start(duration)?;
        if detect().is_some() {
            let handle = self
                .accelerator
                .spawn(duration, Arc::clone(&self.accelerator_stop))?;
            self.accelerator_thread = Some(handle);
            self.accelerator_used = true;
        } else {
            tracing::debug!("No accelerator; mixed window runs CPU and I/O only");
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.io.signal_stop();
        self.cpu.signal_stop();
        self.accelerator_stop.store(true, Ordering::Relaxed);

        let deadline = Instant::now() + self.join_timeout;
        self.io.join_worker(deadline);
        self.cpu.join_workers(deadline);
        if let Some(thread) = self.accelerator_thread.take() {
            match join_until(thread, deadline) {
                Some(Ok(snapshot)) => self.gpu = Some(snapshot),
                Some(Err(payload)) => {
                    self.gpu = Some(AcceleratorSnapshot::Failed {
                        error: panic_message(payload.as_ref()),
                    })
                }
                None => {}
            }
        }
    }

    fn result(&mut self) -> MixedLoadResult {
        let gpu = if self.accelerator_used {
            // A detached thread has not published yet; report whatever
            // the runner last stored.
            GpuOutcome::Snapshot(
                self.gpu
                    .clone()
                    .unwrap_or_else(|| self.accelerator.last_snapshot()),
            )
        } else {
            GpuOutcome::Unavailable(Availability::Unavailable)
        };
        MixedLoadResult {
            cpu: self.cpu.result(),
            io: self.io.result(),
            gpu,
        }
    }

    fn current_subtest(&self) -> String {
        if self.accelerator_active() {
            self.accelerator.current_phase().label().to_string()
        } else {
            CPU_IO_LABEL.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accelerator::AcceleratorConfig;
    use crate::{IoConfig, KernelConfig};

    fn coordinator(root: &std::path::Path) -> MixedLoadCoordinator {
        let kernels = KernelConfig {
            matrix_size: 32,
            fft_len: 1024,
            prime_start: 1000,
            prime_block: 100,
            fallback_matrix_size: 16,
        };
        let io = IoConfig {
            file_size_mb: 1,
            block_size_kb: 64,
            sync_writes: false,
            scratch_root: Some(root.to_path_buf()),
        };
        MixedLoadCoordinator::new(
            CpuStressRunner::with_processing_units(3, kernels),
            IoStressRunner::new(io),
            AcceleratorComputeRunner::new(AcceleratorConfig {
                fallback_matrix_size: 16,
                matmul_m: 64,
                matmul_k: 32,
                matmul_n: 64,
                particle_count: 4096,
                particle_steps: 2,
            }),
        )
    }

    #[test]
    fn test_runs_cpu_and_io_together() {
        let root = tempfile::tempdir().unwrap();
        let mut mixed = coordinator(root.path());
        mixed.start(Duration::from_millis(300)).unwrap();
        std::thread::sleep(Duration::from_millis(350));
        mixed.stop();

        let result = mixed.result();
        assert_eq!(result.cpu.processes_used, 3);
        assert!(result.cpu.cpu_ops > 0);
        assert!(result.io.bytes_written > 0);
        if detect().is_none() {
            assert_eq!(result.gpu, GpuOutcome::Unavailable(Availability::Unavailable));
        }
    }

    #[test]
    fn test_stop_waits_one_join_timeout_overall() {
        let root = tempfile::tempdir().unwrap();
        let heavy = KernelConfig {
            matrix_size: 512,
            fft_len: 1 << 20,
            prime_start: 1 << 40,
            prime_block: 2_000,
            fallback_matrix_size: 16,
        };
        let io = IoConfig {
            file_size_mb: 1,
            block_size_kb: 64,
            sync_writes: false,
            scratch_root: Some(root.path().to_path_buf()),
        };
        let mut mixed = MixedLoadCoordinator::new(
            CpuStressRunner::with_processing_units(6, heavy),
            IoStressRunner::new(io),
            AcceleratorComputeRunner::new(AcceleratorConfig::default()),
        )
        .with_join_timeout(Duration::from_millis(150));
        let started = Instant::now();
        mixed.start(Duration::from_millis(20)).unwrap();
        mixed.stop();
        assert!(
            started.elapsed() < Duration::from_millis(20 + 150 + 150),
            "stop took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_label_without_accelerator() {
        if detect().is_some() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let mut mixed = coordinator(root.path());
        mixed.start(Duration::from_millis(100)).unwrap();
        assert_eq!(mixed.current_subtest(), CPU_IO_LABEL);
        mixed.stop();
    }

    #[test]
    fn test_unavailable_serialises_as_string() {
        let json = serde_json::to_value(MixedLoadResult::default()).unwrap();
        assert_eq!(json["gpu"], "unavailable");
        let back: MixedLoadResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.gpu, GpuOutcome::default());
    }

    #[test]
    fn test_gpu_snapshot_round_trips_through_outcome() {
        let json = r#"{"gpu": {"passes": 10, "duration_s": 5.0, "current_test": "t", "backend": "metal"}}"#;
        let result: MixedLoadResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.gpu.seconds_per_pass(), Some(0.5));
    }
}

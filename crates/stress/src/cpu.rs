// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Multi-worker CPU stress.
//!
//! One dedicated thread per processing unit. Worker `i` runs kernel
//! `i % 3` (Matrix Multiply, FFT, Prime Search) in a loop until its
//! deadline or the stop flag, then sends exactly one [`WorkerResult`] over
//! a oneshot channel and exits. Workers share nothing but the stop flag;
//! each owns its buffers and its RNG.

use crate::runner::{join_until, panic_message, validate_duration};
use crate::{StressError, StressRunner};
use kernels::{matmul, FftPlan, KernelError, Matrix, PrimeWindow};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// The kernel a worker loops over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    Matrix,
    Fft,
    Prime,
}

impl KernelKind {
    pub const ALL: [KernelKind; 3] = [KernelKind::Matrix, KernelKind::Fft, KernelKind::Prime];

    /// Kernel assignment for worker `index`: cycles Matrix, FFT, Prime.
    pub fn for_worker(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Matrix => "Matrix Multiply",
            Self::Fft => "FFT",
            Self::Prime => "Prime Search",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Problem sizes for the compute kernels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Side length of the square matrices multiplied by Matrix workers.
    pub matrix_size: usize,
    /// FFT length; must be a power of two.
    pub fft_len: usize,
    /// First integer scanned by Prime workers.
    pub prime_start: u64,
    /// Integers scanned per Prime pass.
    pub prime_block: u64,
    /// Side length of the accelerator runner's CPU fallback matrices.
    pub fallback_matrix_size: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            matrix_size: 512,
            fft_len: 1 << 20,
            prime_start: 1_000_000,
            prime_block: 5000,
            fallback_matrix_size: 256,
        }
    }
}

/// What one worker reports when it exits.
///
/// For Prime workers `operations` counts primes found; for the other kinds
/// it counts completed kernel invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub kind: KernelKind,
    pub operations: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_s: f64,
}

/// Aggregate of every worker's report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStressResult {
    /// Number of workers launched.
    pub processes_used: usize,
    /// Sum of all contributing operation counts.
    pub cpu_ops: u64,
    /// Operation count per kernel kind; every kind is present.
    pub breakdown: BTreeMap<KernelKind, u64>,
    /// Workers whose report carried an error or never arrived.
    pub failed_workers: usize,
    /// Wall-clock length of the CPU window in seconds.
    pub elapsed_s: f64,
    /// Window seconds per completed matrix multiply, across all workers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matmul_duration_s: Option<f64>,
    /// Window seconds per completed FFT, across all workers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fft_duration_s: Option<f64>,
    pub workers: Vec<WorkerResult>,
}

impl CpuStressResult {
    /// Aggregates worker reports. An error report contributes nothing.
    pub fn aggregate(processes_used: usize, elapsed_s: f64, workers: Vec<WorkerResult>) -> Self {
        let mut breakdown: BTreeMap<KernelKind, u64> =
            KernelKind::ALL.iter().map(|k| (*k, 0)).collect();
        let mut failed_workers = processes_used.saturating_sub(workers.len());

        for w in &workers {
            if let Some(err) = &w.error {
                tracing::warn!(kind = %w.kind, error = %err, "Dropping failed worker's contribution");
                failed_workers += 1;
                continue;
            }
            *breakdown.entry(w.kind).or_insert(0) += w.operations;
        }

        let per_op = |kind: KernelKind| match breakdown.get(&kind).copied().unwrap_or(0) {
            0 => None,
            ops => Some(elapsed_s / ops as f64),
        };

        Self {
            processes_used,
            cpu_ops: breakdown.values().sum(),
            matmul_duration_s: per_op(KernelKind::Matrix),
            fft_duration_s: per_op(KernelKind::Fft),
            breakdown,
            failed_workers,
            elapsed_s,
            workers,
        }
    }

    pub fn operations(&self, kind: KernelKind) -> u64 {
        self.breakdown.get(&kind).copied().unwrap_or(0)
    }
}

struct WorkerSlot {
    index: usize,
    kind: KernelKind,
    thread: Option<JoinHandle<()>>,
    result: oneshot::Receiver<WorkerResult>,
}

/// Runs the three CPU kernels across every processing unit.
pub struct CpuStressRunner {
    processing_units: usize,
    kernels: KernelConfig,
    join_timeout: Duration,
    stop_flag: Arc<AtomicBool>,
    workers: Vec<WorkerSlot>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    result: Option<CpuStressResult>,
}

impl CpuStressRunner {
    /// A runner sized to the detected processing-unit count.
    pub fn new(kernels: KernelConfig) -> Self {
        let units = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_processing_units(units, kernels)
    }

    /// A runner with an explicit worker count (at least one).
    pub fn with_processing_units(units: usize, kernels: KernelConfig) -> Self {
        Self {
            processing_units: units.max(1),
            kernels,
            join_timeout: Duration::from_secs(1),
            stop_flag: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
            started_at: None,
            stopped_at: None,
            result: None,
        }
    }

    /// Sets how long `stop` waits for all workers together.
    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn processing_units(&self) -> usize {
        self.processing_units
    }

    /// Kernel assignment of the launched workers, in index order.
    pub fn assignments(&self) -> Vec<KernelKind> {
        self.workers.iter().map(|w| w.kind).collect()
    }

    /// Raises the stop flag without waiting.
    pub(crate) fn signal_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Joins every worker, all against the one `deadline`.
    pub(crate) fn join_workers(&mut self, deadline: Instant) {
        for slot in &mut self.workers {
            if let Some(thread) = slot.thread.take() {
                if let Some(Err(payload)) = join_until(thread, deadline) {
                    tracing::warn!(
                        worker = slot.index,
                        error = %panic_message(payload.as_ref()),
                        "Worker thread terminated abnormally"
                    );
                }
            }
        }
        if self.stopped_at.is_none() && self.started_at.is_some() {
            self.stopped_at = Some(Instant::now());
            tracing::info!(elapsed_s = self.window_secs(), "CPU stress stopped");
        }
    }

    fn window_secs(&self) -> f64 {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => stop.duration_since(start).as_secs_f64(),
            (Some(start), None) => start.elapsed().as_secs_f64(),
            _ => 0.0,
        }
    }
}

impl StressRunner for CpuStressRunner {
    type Output = CpuStressResult;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn start(&mut self, duration: Duration) -> Result<(), StressError> {
        validate_duration(duration)?;
        if self.started_at.is_some() {
            return Err(StressError::AlreadyStarted { runner: "cpu" });
        }
        let deadline = Instant::now() + duration;
        self.started_at = Some(Instant::now());

        tracing::info!(
            workers = self.processing_units,
            duration_s = duration.as_secs_f64(),
            "Starting CPU stress"
        );

        for index in 0..self.processing_units {
            let kind = KernelKind::for_worker(index);
            let (tx, rx) = oneshot::channel();
            let cfg = self.kernels.clone();
            let stop = Arc::clone(&self.stop_flag);
            let name = format!("cpu-{}-{index}", kind.to_string().to_lowercase().replace(' ', "-"));

            let spawned = std::thread::Builder::new().name(name.clone()).spawn(move || {
                let report = run_worker(kind, &cfg, deadline, &stop);
                tracing::debug!(
                    worker = index,
                    kind = %report.kind,
                    operations = report.operations,
                    "Worker finished"
                );
                // The receiver is gone only if the runner was dropped.
                let _ = tx.send(report);
            });

            match spawned {
                Ok(thread) => self.workers.push(WorkerSlot {
                    index,
                    kind,
                    thread: Some(thread),
                    result: rx,
                }),
                Err(source) => {
                    self.stop_flag.store(true, Ordering::Relaxed);
                    return Err(StressError::Spawn { name, source });
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.signal_stop();
        self.join_workers(Instant::now() + self.join_timeout);
    }

    fn result(&mut self) -> CpuStressResult {
        if let Some(result) = &self.result {
            return result.clone();
        }
        let mut reports = Vec::with_capacity(self.workers.len());
        for slot in &mut self.workers {
            match slot.result.try_recv() {
                Ok(report) => reports.push(report),
                Err(_) => tracing::warn!(worker = slot.index, "No result received from worker"),
            }
        }

        let processes_used = if self.workers.is_empty() {
            self.processing_units
        } else {
            self.workers.len()
        };
        let mut result = CpuStressResult::aggregate(processes_used, self.window_secs(), reports);
        if self.workers.is_empty() {
            // Never started: nothing failed.
            result.failed_workers = 0;
        }
        self.result = Some(result.clone());
        result
    }

    /// Cycles through the kernel labels by elapsed second.
    ///
    /// Workers run all three kernels at once, so this is a display hint,
    /// not the state of any particular worker.
    fn current_subtest(&self) -> String {
        match self.started_at {
            Some(start) if self.stopped_at.is_none() => {
                let second = start.elapsed().as_secs() as usize;
                KernelKind::for_worker(second).label().to_string()
            }
            Some(_) => "Done".to_string(),
            None => "Idle".to_string(),
        }
    }
}

impl Drop for CpuStressRunner {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

/// Body of one worker thread. Kernel errors and panics become the
/// report's `error`.
fn run_worker(
    kind: KernelKind,
    cfg: &KernelConfig,
    deadline: Instant,
    stop: &AtomicBool,
) -> WorkerResult {
    let started = Instant::now();
    let mut operations = 0u64;
    let keep_going = || Instant::now() < deadline && !stop.load(Ordering::Relaxed);

    let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<(), KernelError> {
        let mut rng = StdRng::from_entropy();
        match kind {
            KernelKind::Matrix => {
                let n = cfg.matrix_size;
                let mut a = Matrix::random(n, n, &mut rng);
                let mut b = Matrix::random(n, n, &mut rng);
                let mut c = Matrix::zeros(n, n);
                while keep_going() {
                    a.refill(&mut rng);
                    b.refill(&mut rng);
                    matmul(&a, &b, &mut c)?;
                    operations += 1;
                }
                std::hint::black_box(c.checksum());
            }
            KernelKind::Fft => {
                let plan = FftPlan::new(cfg.fft_len)?;
                let input = plan.random_input(&mut rng);
                let mut buf = input.clone();
                while keep_going() {
                    buf.copy_from_slice(&input);
                    plan.process(&mut buf)?;
                    operations += 1;
                }
                std::hint::black_box(&buf);
            }
            KernelKind::Prime => {
                let mut window = PrimeWindow::new(cfg.prime_start, cfg.prime_block);
                while keep_going() {
                    operations += window.scan();
                }
            }
        }
        Ok(())
    }));

    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };
    WorkerResult {
        kind,
        operations,
        error,
        elapsed_s: started.elapsed().as_secs_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_kernels() -> KernelConfig {
        KernelConfig {
            matrix_size: 32,
            fft_len: 1024,
            prime_start: 1000,
            prime_block: 100,
            fallback_matrix_size: 16,
        }
    }

    #[test]
    fn test_kernel_assignment_cycles() {
        let kinds: Vec<_> = (0..5).map(KernelKind::for_worker).collect();
        assert_eq!(
            kinds,
            vec![
                KernelKind::Matrix,
                KernelKind::Fft,
                KernelKind::Prime,
                KernelKind::Matrix,
                KernelKind::Fft
            ]
        );
    }

    #[test]
    fn test_four_workers_report_per_kind() {
        let mut runner = CpuStressRunner::with_processing_units(4, small_kernels());
        runner.start(Duration::from_millis(300)).unwrap();
        assert_eq!(
            runner.assignments(),
            vec![KernelKind::Matrix, KernelKind::Fft, KernelKind::Prime, KernelKind::Matrix]
        );
        std::thread::sleep(Duration::from_millis(350));
        runner.stop();

        let result = runner.result();
        assert_eq!(result.processes_used, 4);
        assert_eq!(result.workers.len(), 4);
        assert_eq!(result.failed_workers, 0);
        assert!(result.operations(KernelKind::Matrix) > 0);
        assert!(result.operations(KernelKind::Fft) > 0);
        assert!(result.matmul_duration_s.unwrap() > 0.0);
        assert!(result.fft_duration_s.unwrap() > 0.0);
        assert_eq!(
            result.cpu_ops,
            result.breakdown.values().sum::<u64>()
        );
        // Cached on the second read.
        assert_eq!(runner.result(), result);
    }

    #[test]
    fn test_stop_returns_within_bound() {
        let mut runner = CpuStressRunner::with_processing_units(2, small_kernels())
            .with_join_timeout(Duration::from_millis(500));
        let started = Instant::now();
        runner.start(Duration::from_millis(200)).unwrap();
        runner.stop();
        assert!(started.elapsed() < Duration::from_millis(200 + 500 + 100));
    }

    #[test]
    fn test_stuck_workers_share_one_join_timeout() {
        // Each iteration takes far longer than the window, so every worker
        // is still mid-kernel when stop is asked.
        let heavy = KernelConfig {
            matrix_size: 512,
            fft_len: 1 << 20,
            prime_start: 1 << 40,
            prime_block: 2_000,
            fallback_matrix_size: 16,
        };
        let mut runner = CpuStressRunner::with_processing_units(9, heavy)
            .with_join_timeout(Duration::from_millis(150));
        let started = Instant::now();
        runner.start(Duration::from_millis(20)).unwrap();
        runner.stop();
        assert!(
            started.elapsed() < Duration::from_millis(20 + 150 + 150),
            "stop took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_kernel_error_drops_contribution() {
        let mut cfg = small_kernels();
        cfg.fft_len = 1000; // not a power of two
        let mut runner = CpuStressRunner::with_processing_units(3, cfg);
        runner.start(Duration::from_millis(100)).unwrap();
        std::thread::sleep(Duration::from_millis(150));
        runner.stop();

        let result = runner.result();
        assert_eq!(result.failed_workers, 1);
        assert_eq!(result.operations(KernelKind::Fft), 0);
        assert!(result.fft_duration_s.is_none());
        assert!(result.operations(KernelKind::Matrix) > 0);
        let fft = result.workers.iter().find(|w| w.kind == KernelKind::Fft).unwrap();
        assert!(fft.error.as_deref().unwrap().contains("power of two"));
    }

    #[test]
    fn test_zero_kind_counts_are_zero_not_missing() {
        let result = CpuStressResult::aggregate(1, 1.0, vec![WorkerResult {
            kind: KernelKind::Matrix,
            operations: 4,
            error: None,
            elapsed_s: 1.0,
        }]);
        assert_eq!(result.breakdown.len(), 3);
        assert_eq!(result.operations(KernelKind::Prime), 0);
        assert_eq!(result.matmul_duration_s, Some(0.25));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut runner = CpuStressRunner::with_processing_units(1, small_kernels());
        assert!(matches!(runner.start(Duration::ZERO), Err(StressError::InvalidDuration)));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut runner = CpuStressRunner::with_processing_units(1, small_kernels());
        runner.start(Duration::from_millis(20)).unwrap();
        assert!(matches!(
            runner.start(Duration::from_millis(20)),
            Err(StressError::AlreadyStarted { .. })
        ));
        runner.stop();
    }

    #[test]
    fn test_subtest_labels() {
        let mut runner = CpuStressRunner::with_processing_units(1, small_kernels());
        assert_eq!(runner.current_subtest(), "Idle");
        runner.start(Duration::from_millis(50)).unwrap();
        assert_eq!(runner.current_subtest(), "Matrix Multiply");
        runner.stop();
        assert_eq!(runner.current_subtest(), "Done");
    }

    #[test]
    fn test_breakdown_serialises_with_kind_names() {
        let result = CpuStressResult::aggregate(0, 0.0, Vec::new());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["breakdown"]["matrix"], 0);
        assert_eq!(json["breakdown"]["prime"], 0);
        assert!(json.get("matmul_duration_s").is_none());
    }
}

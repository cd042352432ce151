// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Accelerator compute stress.
//!
//! The capability probe runs once per process and its answer is cached in
//! a `OnceLock`. Backends are tried in priority order: a unified-memory
//! device (Metal), then any other hardware GPU (Vulkan, DX12). Device
//! support is compiled in with the `gpu` feature; without it, or when no
//! adapter is found, [`AcceleratorComputeRunner::run`] takes the CPU
//! fallback path and reports backend `"fallback-cpu"`.
//!
//! Each run overwrites the runner's last snapshot; no history is kept. Any
//! fault ends the run early with a [`AcceleratorSnapshot::Failed`]; there
//! are no retries.

#[cfg(feature = "gpu")]
mod device;

use crate::runner::panic_message;
use crate::StressError;
use kernels::{matmul, Matrix};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Backend name reported by the CPU fallback path.
pub const FALLBACK_BACKEND: &str = "fallback-cpu";

/// Which class of device the probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// A device sharing memory with the CPU (Apple silicon via Metal).
    UnifiedMemory,
    /// A discrete or integrated GPU behind Vulkan or DX12.
    Gpu,
}

/// Result of the process-wide capability probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceleratorCapability {
    pub kind: BackendKind,
    /// Graphics API backend, e.g. `metal` or `vulkan`.
    pub backend: String,
    /// Adapter name as reported by the driver.
    pub adapter: String,
}

static CAPABILITY: OnceLock<Option<AcceleratorCapability>> = OnceLock::new();

/// The cached capability, probing on first call.
pub fn detect() -> Option<&'static AcceleratorCapability> {
    CAPABILITY
        .get_or_init(|| {
            let found = probe_backends();
            match &found {
                Some(cap) => tracing::info!(
                    backend = %cap.backend,
                    adapter = %cap.adapter,
                    kind = ?cap.kind,
                    "Accelerator detected"
                ),
                None => tracing::info!("No accelerator backend; using CPU fallback"),
            }
            found
        })
        .as_ref()
}

#[cfg(feature = "gpu")]
fn probe_backends() -> Option<AcceleratorCapability> {
    match catch_unwind(device::probe) {
        Ok(found) => found,
        Err(payload) => {
            tracing::warn!(error = %panic_message(payload.as_ref()), "Accelerator probe faulted");
            None
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn probe_backends() -> Option<AcceleratorCapability> {
    tracing::debug!("Built without the `gpu` feature");
    None
}

/// What the accelerator loop is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AcceleratorPhase {
    Idle = 0,
    DeviceMatmul = 1,
    Particles = 2,
    FallbackMatmul = 3,
}

impl AcceleratorPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::DeviceMatmul,
            2 => Self::Particles,
            3 => Self::FallbackMatmul,
            _ => Self::Idle,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::DeviceMatmul => "Matrix Multiply (device)",
            Self::Particles => "Particle Simulation (device)",
            Self::FallbackMatmul => "Matrix Multiply (fallback)",
        }
    }
}

impl fmt::Display for AcceleratorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The outcome of the most recent accelerator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AcceleratorSnapshot {
    Completed {
        passes: u64,
        duration_s: f64,
        current_test: String,
        backend: String,
    },
    Failed {
        error: String,
    },
    NotRun {
        note: String,
    },
}

impl Default for AcceleratorSnapshot {
    fn default() -> Self {
        Self::NotRun {
            note: "not run".to_string(),
        }
    }
}

impl AcceleratorSnapshot {
    /// Mean seconds per pass, when the run completed at least one pass.
    pub fn seconds_per_pass(&self) -> Option<f64> {
        match self {
            Self::Completed {
                passes, duration_s, ..
            } if *passes > 0 => Some(duration_s / *passes as f64),
            _ => None,
        }
    }
}

/// Workload sizes for the accelerator loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceleratorConfig {
    /// Side length of the square matrices on the CPU fallback path.
    pub fallback_matrix_size: usize,
    /// Device matmul shape: `(m × k) · (k × n)`.
    pub matmul_m: u32,
    pub matmul_k: u32,
    pub matmul_n: u32,
    pub particle_count: u32,
    /// Integration steps per particle pass.
    pub particle_steps: u32,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            fallback_matrix_size: 256,
            matmul_m: 2048,
            matmul_k: 512,
            matmul_n: 2048,
            particle_count: 1_000_000,
            particle_steps: 4,
        }
    }
}

/// Runs device compute (or the CPU fallback) for a fixed window.
///
/// Cheap to clone; clones share the phase label and last snapshot.
#[derive(Clone)]
pub struct AcceleratorComputeRunner {
    config: AcceleratorConfig,
    phase: Arc<AtomicU8>,
    last: Arc<watch::Sender<AcceleratorSnapshot>>,
}

impl AcceleratorComputeRunner {
    pub fn new(config: AcceleratorConfig) -> Self {
        let (last, _) = watch::channel(AcceleratorSnapshot::default());
        Self {
            config,
            phase: Arc::new(AtomicU8::new(AcceleratorPhase::Idle as u8)),
            last: Arc::new(last),
        }
    }

    pub fn current_phase(&self) -> AcceleratorPhase {
        AcceleratorPhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub fn last_snapshot(&self) -> AcceleratorSnapshot {
        self.last.borrow().clone()
    }

    fn set_phase(&self, phase: AcceleratorPhase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    /// Runs for `duration` or until `stop` is set, blocking the caller.
    ///
    /// The snapshot is also stored as the runner's last snapshot.
    pub fn run(&self, duration: Duration, stop: &AtomicBool) -> AcceleratorSnapshot {
        let capability = detect();
        let deadline = Instant::now() + duration;
        let started = Instant::now();
        let mut passes = 0u64;

        let outcome = catch_unwind(AssertUnwindSafe(|| match capability {
            Some(cap) => self.device_loop(cap, deadline, stop, &mut passes),
            None => self.fallback_loop(deadline, stop, &mut passes),
        }));
        let current_test = self.current_phase().label().to_string();
        self.set_phase(AcceleratorPhase::Idle);

        let snapshot = match outcome {
            Ok(Ok(backend)) => AcceleratorSnapshot::Completed {
                passes,
                duration_s: round_ms(started.elapsed().as_secs_f64()),
                current_test,
                backend,
            },
            Ok(Err(e)) => AcceleratorSnapshot::Failed {
                error: e.to_string(),
            },
            Err(payload) => AcceleratorSnapshot::Failed {
                error: panic_message(payload.as_ref()),
            },
        };
        match &snapshot {
            AcceleratorSnapshot::Failed { error } => {
                tracing::warn!(error = %error, passes, "Accelerator run aborted")
            }
            _ => tracing::info!(passes, "Accelerator run finished"),
        }
        self.last.send_replace(snapshot.clone());
        snapshot
    }

    /// Runs [`run`](Self::run) on a named background thread.
    pub fn spawn(
        &self,
        duration: Duration,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<AcceleratorSnapshot>, StressError> {
        let runner = self.clone();
        std::thread::Builder::new()
            .name("accelerator".into())
            .spawn(move || runner.run(duration, &stop))
            .map_err(|source| StressError::Spawn {
                name: "accelerator".into(),
                source,
            })
    }

    fn fallback_loop(
        &self,
        deadline: Instant,
        stop: &AtomicBool,
        passes: &mut u64,
    ) -> Result<String, StressError> {
        let n = self.config.fallback_matrix_size;
        let mut rng = StdRng::from_entropy();
        let mut a = Matrix::random(n, n, &mut rng);
        let mut b = Matrix::random(n, n, &mut rng);
        let mut c = Matrix::zeros(n, n);

        self.set_phase(AcceleratorPhase::FallbackMatmul);
        while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
            a.refill(&mut rng);
            b.refill(&mut rng);
            matmul(&a, &b, &mut c)?;
            *passes += 1;
        }
        std::hint::black_box(c.checksum());
        Ok(FALLBACK_BACKEND.to_string())
    }

    #[cfg(feature = "gpu")]
    fn device_loop(
        &self,
        cap: &AcceleratorCapability,
        deadline: Instant,
        stop: &AtomicBool,
        passes: &mut u64,
    ) -> Result<String, StressError> {
        let ctx = device::DeviceContext::new(cap, &self.config)?;
        while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
            self.set_phase(AcceleratorPhase::DeviceMatmul);
            ctx.matmul_pass()?;
            self.set_phase(AcceleratorPhase::Particles);
            ctx.particle_pass()?;
            *passes += 1;
        }
        Ok(cap.backend.clone())
    }

    #[cfg(not(feature = "gpu"))]
    fn device_loop(
        &self,
        _cap: &AcceleratorCapability,
        deadline: Instant,
        stop: &AtomicBool,
        passes: &mut u64,
    ) -> Result<String, StressError> {
        self.fallback_loop(deadline, stop, passes)
    }
}

impl Default for AcceleratorComputeRunner {
    fn default() -> Self {
        Self::new(AcceleratorConfig::default())
    }
}

fn round_ms(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> AcceleratorConfig {
        AcceleratorConfig {
            fallback_matrix_size: 32,
            matmul_m: 64,
            matmul_k: 32,
            matmul_n: 64,
            particle_count: 4096,
            particle_steps: 2,
        }
    }

    #[test]
    fn test_detect_is_cached() {
        let first = detect().map(|c| c as *const AcceleratorCapability);
        let second = detect().map(|c| c as *const AcceleratorCapability);
        assert_eq!(first, second);
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_fallback_run_counts_passes() {
        assert!(detect().is_none());
        let runner = AcceleratorComputeRunner::new(small());
        let stop = AtomicBool::new(false);
        let snap = runner.run(Duration::from_millis(200), &stop);
        match &snap {
            AcceleratorSnapshot::Completed {
                passes,
                backend,
                current_test,
                ..
            } => {
                assert_eq!(backend, FALLBACK_BACKEND);
                assert!(*passes > 0);
                assert_eq!(current_test, "Matrix Multiply (fallback)");
            }
            other => panic!("unexpected snapshot {other:?}"),
        }
        assert_eq!(runner.last_snapshot(), snap);
        assert_eq!(runner.current_phase(), AcceleratorPhase::Idle);
    }

    #[test]
    fn test_run_completes_whatever_the_backend() {
        let runner = AcceleratorComputeRunner::new(small());
        let stop = AtomicBool::new(false);
        let snap = runner.run(Duration::from_millis(200), &stop);
        assert!(matches!(
            snap,
            AcceleratorSnapshot::Completed { .. } | AcceleratorSnapshot::Failed { .. }
        ));
    }

    #[test]
    fn test_stop_flag_ends_run_early() {
        let runner = AcceleratorComputeRunner::new(small());
        let stop = Arc::new(AtomicBool::new(false));
        let handle = runner.spawn(Duration::from_secs(30), Arc::clone(&stop)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::Relaxed);
        let started = Instant::now();
        let snap = handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!matches!(snap, AcceleratorSnapshot::NotRun { .. }));
    }

    #[test]
    fn test_seconds_per_pass() {
        let snap = AcceleratorSnapshot::Completed {
            passes: 4,
            duration_s: 2.0,
            current_test: "x".into(),
            backend: "metal".into(),
        };
        assert_eq!(snap.seconds_per_pass(), Some(0.5));
        let zero = AcceleratorSnapshot::Completed {
            passes: 0,
            duration_s: 2.0,
            current_test: "x".into(),
            backend: "metal".into(),
        };
        assert_eq!(zero.seconds_per_pass(), None);
        assert_eq!(AcceleratorSnapshot::default().seconds_per_pass(), None);
    }

    #[test]
    fn test_snapshot_json_shapes() {
        let json = serde_json::to_value(AcceleratorSnapshot::Failed { error: "lost".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"error": "lost"}));

        let back: AcceleratorSnapshot = serde_json::from_str(
            r#"{"passes": 3, "duration_s": 1.5, "current_test": "t", "backend": "vulkan"}"#,
        )
        .unwrap();
        assert_eq!(back.seconds_per_pass(), Some(0.5));

        let note: AcceleratorSnapshot = serde_json::from_str(r#"{"note": "not run"}"#).unwrap();
        assert_eq!(note, AcceleratorSnapshot::default());
    }
}

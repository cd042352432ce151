// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # stress
//!
//! Workload runners for ChronosBench.
//!
//! | Runner | Workload |
//! |---|---|
//! | [`CpuStressRunner`] | one thread per processing unit, cycling Matrix / FFT / Prime |
//! | [`IoStressRunner`] | sequential write-then-read of a scratch file |
//! | [`AcceleratorComputeRunner`] | device matmul + particle integration, or a CPU fallback |
//! | [`MixedLoadCoordinator`] | all of the above over one window |
//!
//! All runners share the [`StressRunner`] lifecycle. Cancellation is
//! cooperative: workers check a stop flag between kernel iterations, so
//! a stop may overrun by up to one iteration.
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use stress::{CpuStressRunner, KernelConfig, StressRunner};
//!
//! let mut cpu = CpuStressRunner::new(KernelConfig::default());
//! cpu.start(Duration::from_secs(10)).unwrap();
//! std::thread::sleep(Duration::from_secs(10));
//! cpu.stop();
//! println!("{} ops", cpu.result().cpu_ops);
//! ```

pub mod accelerator;
mod cpu;
mod error;
mod io;
mod mixed;
mod runner;

pub use accelerator::{
    AcceleratorCapability, AcceleratorComputeRunner, AcceleratorConfig, AcceleratorPhase,
    AcceleratorSnapshot, BackendKind,
};
pub use cpu::{CpuStressResult, CpuStressRunner, KernelConfig, KernelKind, WorkerResult};
pub use error::StressError;
pub use io::{IoConfig, IoStressResult, IoStressRunner};
pub use mixed::{Availability, GpuOutcome, MixedLoadCoordinator, MixedLoadResult, CPU_IO_LABEL};
pub use runner::StressRunner;

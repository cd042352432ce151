// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the stress runners.
//!
//! Only lifecycle problems surface as [`StressError`]. Faults inside a
//! running workload are recorded in that workload's result instead.

/// Errors that can occur when starting or driving a stress runner.
#[derive(Debug, thiserror::Error)]
pub enum StressError {
    /// A zero-length run was requested.
    #[error("duration must be greater than zero")]
    InvalidDuration,

    /// `start` was called on a runner that has already been started.
    #[error("{runner} runner has already been started")]
    AlreadyStarted { runner: &'static str },

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The I/O runner could not create its scratch directory.
    #[error("failed to create scratch directory under {path}: {source}")]
    Scratch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// File I/O failed inside the I/O workload.
    #[error("I/O workload failed: {0}")]
    Io(#[from] std::io::Error),

    /// A compute kernel rejected its inputs.
    #[error("kernel error: {0}")]
    Kernel(#[from] kernels::KernelError),

    /// The accelerator device faulted.
    #[error("accelerator error: {0}")]
    Accelerator(String),
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kernels
//!
//! The repeatable compute operations that the stress runners loop over.
//!
//! This crate provides:
//! - [`Matrix`] and [`matmul`]: dense single-precision matrix multiply.
//! - [`FftPlan`]: an in-place radix-2 complex FFT with precomputed twiddles.
//! - [`PrimeWindow`]: trial-division prime search over an advancing window.
//!
//! # Design Goals
//! - No heap allocation in hot paths: every kernel works on buffers the
//!   caller allocated once before entering its loop.
//! - No threads and no I/O. Scheduling, deadlines and cancellation belong
//!   to the runners in the `stress` crate.
//! - Clean error types via `thiserror`.

mod error;
mod fft;
mod matrix;
mod prime;

pub use error::KernelError;
pub use fft::{Complex32, FftPlan};
pub use matrix::{matmul, Matrix};
pub use prime::{is_prime, PrimeWindow};

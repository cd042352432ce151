// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for kernel operations.

/// Errors that can occur when invoking a kernel with malformed buffers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// Operand dimensions are incompatible for the requested operation.
    #[error("dimension mismatch in {op}: expected {expected}, got {actual}")]
    DimensionMismatch {
        op: &'static str,
        expected: String,
        actual: String,
    },

    /// The FFT length is not a power of two.
    #[error("FFT length {len} is not a power of two")]
    NotPowerOfTwo { len: usize },

    /// A buffer length does not match the length the kernel was prepared for.
    #[error("buffer length mismatch in {op}: expected {expected}, got {actual}")]
    LengthMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },
}

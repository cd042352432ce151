// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dense single-precision matrices and matrix multiplication.

use crate::KernelError;
use rand::Rng;

/// A row-major `rows × cols` matrix of `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Creates a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Creates a matrix filled with uniform random values in `[0, 1)`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols).map(|_| rng.gen::<f32>()).collect();
        Self { rows, cols, data }
    }

    /// Wraps existing row-major data.
    ///
    /// # Errors
    /// Returns [`KernelError::LengthMismatch`] if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, KernelError> {
        if data.len() != rows * cols {
            return Err(KernelError::LengthMismatch {
                op: "Matrix::from_vec",
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Refills the matrix in place with new random values.
    pub fn refill<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.data.iter_mut().for_each(|x| *x = rng.gen::<f32>());
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Sum of all elements. Used as a cheap checksum so the optimiser cannot
    /// discard a product nobody reads.
    pub fn checksum(&self) -> f64 {
        self.data.iter().map(|&x| x as f64).sum()
    }
}

/// Performs matrix multiplication: `output = lhs @ rhs`.
///
/// `lhs` is `[M, K]`, `rhs` is `[K, N]`, and `output` must be `[M, N]`.
/// The output is fully overwritten.
///
/// # Errors
/// Returns [`KernelError::DimensionMismatch`] if dimensions are incompatible.
pub fn matmul(lhs: &Matrix, rhs: &Matrix, output: &mut Matrix) -> Result<(), KernelError> {
    if lhs.cols != rhs.rows {
        return Err(KernelError::DimensionMismatch {
            op: "matmul",
            expected: format!("rhs with {} rows", lhs.cols),
            actual: format!("{}x{}", rhs.rows, rhs.cols),
        });
    }
    if output.rows != lhs.rows || output.cols != rhs.cols {
        return Err(KernelError::DimensionMismatch {
            op: "matmul (output)",
            expected: format!("{}x{}", lhs.rows, rhs.cols),
            actual: format!("{}x{}", output.rows, output.cols),
        });
    }

    matmul_f32(
        &lhs.data,
        &rhs.data,
        &mut output.data,
        lhs.rows,
        lhs.cols,
        rhs.cols,
    );
    Ok(())
}

/// Portable f32 matrix multiplication in ikj order.
///
/// The inner loop is a saxpy over a row of `c`, sequential in memory for
/// both `b` and `c`, which the compiler auto-vectorises.
fn matmul_f32(a: &[f32], b: &[f32], c: &mut [f32], m: usize, k: usize, n: usize) {
    c.iter_mut().for_each(|x| *x = 0.0);

    for i in 0..m {
        let c_row = &mut c[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            let b_row = &b[p * n..(p + 1) * n];
            for (c_ij, &b_pj) in c_row.iter_mut().zip(b_row) {
                *c_ij += a_ip * b_pj;
            }
        }
    }
}

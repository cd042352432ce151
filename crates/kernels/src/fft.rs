// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! In-place radix-2 complex FFT.
//!
//! [`FftPlan`] precomputes the twiddle factors once for a given length so
//! that repeated transforms in a stress loop do no trigonometry and no
//! allocation.

use crate::KernelError;
use rand::Rng;
use std::ops::{Add, Mul, Sub};

/// A single-precision complex number.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

impl Complex32 {
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    /// Squared magnitude.
    pub fn norm_sqr(self) -> f32 {
        self.re * self.re + self.im * self.im
    }
}

impl Add for Complex32 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex32 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex32 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// A reusable forward FFT of a fixed power-of-two length.
#[derive(Debug, Clone)]
pub struct FftPlan {
    len: usize,
    /// `exp(-2πik/len)` for `k` in `0..len/2`.
    twiddles: Vec<Complex32>,
}

impl FftPlan {
    /// Prepares a transform of `len` points.
    ///
    /// # Errors
    /// Returns [`KernelError::NotPowerOfTwo`] unless `len` is a power of two.
    pub fn new(len: usize) -> Result<Self, KernelError> {
        if !len.is_power_of_two() {
            return Err(KernelError::NotPowerOfTwo { len });
        }
        let twiddles = (0..len / 2)
            .map(|k| {
                let angle = -2.0 * std::f64::consts::PI * k as f64 / len as f64;
                Complex32::new(angle.cos() as f32, angle.sin() as f32)
            })
            .collect();
        Ok(Self { len, twiddles })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocates a buffer of the plan's length filled with random samples
    /// (real and imaginary parts uniform in `[0, 1)`).
    pub fn random_input<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Complex32> {
        (0..self.len)
            .map(|_| Complex32::new(rng.gen::<f32>(), rng.gen::<f32>()))
            .collect()
    }

    /// Transforms `buf` in place (decimation in time).
    ///
    /// # Errors
    /// Returns [`KernelError::LengthMismatch`] if `buf` is not the planned length.
    pub fn process(&self, buf: &mut [Complex32]) -> Result<(), KernelError> {
        if buf.len() != self.len {
            return Err(KernelError::LengthMismatch {
                op: "fft",
                expected: self.len,
                actual: buf.len(),
            });
        }
        let n = self.len;
        if n <= 1 {
            return Ok(());
        }

        let bits = n.trailing_zeros();
        for i in 0..n {
            let j = i.reverse_bits() >> (usize::BITS - bits);
            if i < j {
                buf.swap(i, j);
            }
        }

        let mut size = 2;
        while size <= n {
            let half = size / 2;
            let stride = n / size;
            for start in (0..n).step_by(size) {
                for k in 0..half {
                    let w = self.twiddles[k * stride];
                    let even = buf[start + k];
                    let odd = buf[start + k + half] * w;
                    buf[start + k] = even + odd;
                    buf[start + k + half] = even - odd;
                }
            }
            size *= 2;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn assert_close(a: Complex32, b: Complex32, tol: f32) {
        assert!(
            (a.re - b.re).abs() < tol && (a.im - b.im).abs() < tol,
            "{a:?} != {b:?}"
        );
    }

    /// O(n²) reference transform.
    fn naive_dft(input: &[Complex32]) -> Vec<Complex32> {
        let n = input.len();
        (0..n)
            .map(|k| {
                let mut acc = (0.0f64, 0.0f64);
                for (t, x) in input.iter().enumerate() {
                    let angle = -2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64;
                    let (s, c) = angle.sin_cos();
                    acc.0 += x.re as f64 * c - x.im as f64 * s;
                    acc.1 += x.re as f64 * s + x.im as f64 * c;
                }
                Complex32::new(acc.0 as f32, acc.1 as f32)
            })
            .collect()
    }

    #[test]
    fn test_impulse_is_flat() {
        let plan = FftPlan::new(8).unwrap();
        let mut buf = vec![Complex32::default(); 8];
        buf[0] = Complex32::new(1.0, 0.0);
        plan.process(&mut buf).unwrap();
        for x in buf {
            assert_close(x, Complex32::new(1.0, 0.0), 1e-6);
        }
    }

    #[test]
    fn test_constant_concentrates_in_dc() {
        let plan = FftPlan::new(16).unwrap();
        let mut buf = vec![Complex32::new(1.0, 0.0); 16];
        plan.process(&mut buf).unwrap();
        assert_close(buf[0], Complex32::new(16.0, 0.0), 1e-5);
        assert!(buf[1..].iter().all(|x| x.norm_sqr() < 1e-8));
    }

    #[test]
    fn test_matches_naive_dft() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let plan = FftPlan::new(64).unwrap();
        let input = plan.random_input(&mut rng);
        let expected = naive_dft(&input);

        let mut buf = input.clone();
        plan.process(&mut buf).unwrap();
        for (got, want) in buf.iter().zip(&expected) {
            assert_close(*got, *want, 1e-3);
        }
    }

    #[test]
    fn test_single_point_is_identity() {
        let plan = FftPlan::new(1).unwrap();
        let mut buf = vec![Complex32::new(3.0, -2.0)];
        plan.process(&mut buf).unwrap();
        assert_eq!(buf[0], Complex32::new(3.0, -2.0));
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert_eq!(FftPlan::new(12).unwrap_err(), KernelError::NotPowerOfTwo { len: 12 });
        assert!(FftPlan::new(0).is_err());
    }

    #[test]
    fn test_rejects_wrong_buffer_length() {
        let plan = FftPlan::new(8).unwrap();
        let mut buf = vec![Complex32::default(); 4];
        assert!(matches!(
            plan.process(&mut buf),
            Err(KernelError::LengthMismatch { expected: 8, actual: 4, .. })
        ));
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Trial-division prime search.
//!
//! Deliberately unoptimised: every candidate is divided by every integer
//! from 2 up to its integer square root, which keeps the ALU and branch
//! predictor busy rather than the memory system.

/// Returns `true` if `n` is prime, by trial division up to `isqrt(n)`.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let root = isqrt(n);
    let mut d = 2;
    while d <= root {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

/// Integer square root: the largest `r` with `r * r <= n`.
fn isqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r > 0 && r.saturating_mul(r) > n {
        r -= 1;
    }
    while (r + 1).saturating_mul(r + 1) <= n {
        r += 1;
    }
    r
}

/// A fixed-size window of candidates that advances by its own size on
/// every scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeWindow {
    start: u64,
    block: u64,
}

impl PrimeWindow {
    pub fn new(start: u64, block: u64) -> Self {
        Self { start, block }
    }

    /// First candidate of the next scan.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Counts the primes in `[start, start + block)` and advances the window.
    pub fn scan(&mut self) -> u64 {
        let end = self.start.saturating_add(self.block);
        let found = (self.start..end).filter(|&n| is_prime(n)).count() as u64;
        self.start = end;
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_primes() {
        let primes: Vec<u64> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn test_squares_of_primes_are_composite() {
        assert!(!is_prime(49));
        assert!(!is_prime(121));
        assert!(!is_prime(1_000_003 * 3));
    }

    #[test]
    fn test_isqrt_boundaries() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(u64::MAX), 4_294_967_295);
    }

    #[test]
    fn test_window_counts_and_advances() {
        let mut w = PrimeWindow::new(0, 100);
        assert_eq!(w.scan(), 25);
        assert_eq!(w.start(), 100);
        // 101..200 holds 21 primes.
        assert_eq!(w.scan(), 21);
        assert_eq!(w.start(), 200);
    }

    #[test]
    fn test_window_near_one_million() {
        // 1_000_003 is the first prime above one million.
        let mut w = PrimeWindow::new(1_000_000, 4);
        assert_eq!(w.scan(), 1);
    }
}

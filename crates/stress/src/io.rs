// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sequential file I/O stress.
//!
//! A single background thread repeatedly writes a fixed-size file in
//! fixed-size blocks, then reads it back with the same block size, inside
//! a private scratch directory. Byte counters are atomics so partial
//! progress survives a worker that misses its join timeout. The scratch
//! directory is a [`tempfile::TempDir`] and is removed when the worker
//! exits, whatever the outcome.

use crate::runner::{join_until, panic_message, validate_duration};
use crate::{StressError, StressRunner};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
/// Lower bound on the elapsed time used for throughput, in seconds.
pub const ELAPSED_FLOOR_S: f64 = 1.0;

/// Sizes and placement of the I/O workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Size of the file written and read back each cycle.
    pub file_size_mb: u64,
    /// Size of each write and read call.
    pub block_size_kb: u64,
    /// Flush the file to stable storage after each write pass.
    pub sync_writes: bool,
    /// Directory under which the scratch directory is created; the OS
    /// temp directory when unset.
    pub scratch_root: Option<PathBuf>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            file_size_mb: 1024,
            block_size_kb: 1024,
            sync_writes: true,
            scratch_root: None,
        }
    }
}

impl IoConfig {
    fn block_bytes(&self) -> usize {
        (self.block_size_kb.max(1) * 1024) as usize
    }

    fn blocks_per_file(&self) -> u64 {
        ((self.file_size_mb * 1024) / self.block_size_kb.max(1)).max(1)
    }
}

/// Throughput of one I/O run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IoStressResult {
    pub read_mb_s: f64,
    pub write_mb_s: f64,
    /// Measured wall-clock time of the worker loop.
    pub duration_s: f64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Set when the workload aborted; the throughput then covers only the
    /// bytes moved before the fault.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IoStressResult {
    /// Throughput from raw counters, with `elapsed` floored at
    /// [`ELAPSED_FLOOR_S`].
    pub fn from_counters(
        bytes_read: u64,
        bytes_written: u64,
        elapsed_s: f64,
        error: Option<String>,
    ) -> Self {
        let elapsed_s = if elapsed_s.is_finite() { elapsed_s.max(0.0) } else { 0.0 };
        let denom = elapsed_s.max(ELAPSED_FLOOR_S);
        Self {
            read_mb_s: bytes_read as f64 / BYTES_PER_MB / denom,
            write_mb_s: bytes_written as f64 / BYTES_PER_MB / denom,
            duration_s: elapsed_s,
            bytes_read,
            bytes_written,
            error,
        }
    }
}

#[derive(Debug, Default)]
struct IoCounters {
    read: AtomicU64,
    written: AtomicU64,
    elapsed_us: AtomicU64,
}

/// Write-then-read file loop on one background thread.
pub struct IoStressRunner {
    config: IoConfig,
    join_timeout: Duration,
    stop_flag: Arc<AtomicBool>,
    counters: Arc<IoCounters>,
    worker: Option<JoinHandle<Result<(), StressError>>>,
    error: Option<String>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl IoStressRunner {
    pub fn new(config: IoConfig) -> Self {
        Self {
            config,
            join_timeout: Duration::from_secs(2),
            stop_flag: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(IoCounters::default()),
            worker: None,
            error: None,
            started_at: None,
            stopped_at: None,
        }
    }

    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    /// Raises the stop flag without waiting.
    pub(crate) fn signal_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Joins the worker against `deadline`.
    pub(crate) fn join_worker(&mut self, deadline: Instant) {
        if let Some(worker) = self.worker.take() {
            match join_until(worker, deadline) {
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => {
                    tracing::warn!(error = %e, "I/O workload aborted");
                    self.error = Some(e.to_string());
                }
                Some(Err(payload)) => {
                    let msg = panic_message(payload.as_ref());
                    tracing::warn!(error = %msg, "I/O worker terminated abnormally");
                    self.error = Some(msg);
                }
                None => {}
            }
        }
        if self.stopped_at.is_none() && self.started_at.is_some() {
            self.stopped_at = Some(Instant::now());
            tracing::info!(
                bytes_written = self.counters.written.load(Ordering::Relaxed),
                bytes_read = self.counters.read.load(Ordering::Relaxed),
                "I/O stress stopped"
            );
        }
    }
}

impl StressRunner for IoStressRunner {
    type Output = IoStressResult;

    fn name(&self) -> &'static str {
        "io"
    }

    fn start(&mut self, duration: Duration) -> Result<(), StressError> {
        validate_duration(duration)?;
        if self.started_at.is_some() {
            return Err(StressError::AlreadyStarted { runner: "io" });
        }
        let deadline = Instant::now() + duration;
        let config = self.config.clone();
        let stop = Arc::clone(&self.stop_flag);
        let counters = Arc::clone(&self.counters);

        tracing::info!(
            file_size_mb = config.file_size_mb,
            block_size_kb = config.block_size_kb,
            duration_s = duration.as_secs_f64(),
            "Starting I/O stress"
        );

        let worker = std::thread::Builder::new()
            .name("io-stress".into())
            .spawn(move || {
                let started = Instant::now();
                let outcome = io_loop(&config, deadline, &stop, &counters);
                counters
                    .elapsed_us
                    .store(started.elapsed().as_micros() as u64, Ordering::Relaxed);
                outcome
            })
            .map_err(|source| StressError::Spawn {
                name: "io-stress".into(),
                source,
            })?;

        self.worker = Some(worker);
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        self.signal_stop();
        self.join_worker(Instant::now() + self.join_timeout);
    }

    fn result(&mut self) -> IoStressResult {
        let measured_us = self.counters.elapsed_us.load(Ordering::Relaxed);
        let elapsed_s = if measured_us > 0 {
            measured_us as f64 / 1_000_000.0
        } else {
            // Worker still running or detached: fall back to the runner's window.
            match (self.started_at, self.stopped_at) {
                (Some(start), Some(stop)) => stop.duration_since(start).as_secs_f64(),
                (Some(start), None) => start.elapsed().as_secs_f64(),
                _ => 0.0,
            }
        };
        IoStressResult::from_counters(
            self.counters.read.load(Ordering::Relaxed),
            self.counters.written.load(Ordering::Relaxed),
            elapsed_s,
            self.error.clone(),
        )
    }

    fn current_subtest(&self) -> String {
        "Sequential Write/Read".to_string()
    }
}

impl Drop for IoStressRunner {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

fn create_scratch(root: Option<&Path>) -> Result<tempfile::TempDir, StressError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("chronos_io_");
    let dir = match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    };
    dir.map_err(|source| StressError::Scratch {
        path: root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir)
            .display()
            .to_string(),
        source,
    })
}

fn io_loop(
    config: &IoConfig,
    deadline: Instant,
    stop: &AtomicBool,
    counters: &IoCounters,
) -> Result<(), StressError> {
    let scratch = create_scratch(config.scratch_root.as_deref())?;
    tracing::debug!(dir = %scratch.path().display(), "I/O scratch directory created");

    let outcome = write_read_cycles(scratch.path(), config, deadline, stop, counters);

    let dir = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove I/O scratch directory");
    }
    outcome
}

fn write_read_cycles(
    dir: &Path,
    config: &IoConfig,
    deadline: Instant,
    stop: &AtomicBool,
    counters: &IoCounters,
) -> Result<(), StressError> {
    let running = || Instant::now() < deadline && !stop.load(Ordering::Relaxed);
    let path = dir.join("bigfile.bin");
    let block = vec![b'0'; config.block_bytes()];
    let mut buf = vec![0u8; config.block_bytes()];

    'cycles: while running() {
        let mut file = File::create(&path)?;
        for _ in 0..config.blocks_per_file() {
            if !running() {
                break 'cycles;
            }
            file.write_all(&block)?;
            counters.written.fetch_add(block.len() as u64, Ordering::Relaxed);
        }
        if config.sync_writes {
            file.sync_all()?;
        }
        drop(file);

        let mut file = File::open(&path)?;
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            counters.read.fetch_add(n as u64, Ordering::Relaxed);
            if !running() {
                break 'cycles;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(root: &Path) -> IoConfig {
        IoConfig {
            file_size_mb: 1,
            block_size_kb: 64,
            sync_writes: false,
            scratch_root: Some(root.to_path_buf()),
        }
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_moves_bytes_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = IoStressRunner::new(small(root.path()));
        runner.start(Duration::from_millis(300)).unwrap();
        std::thread::sleep(Duration::from_millis(350));
        runner.stop();

        let r = runner.result();
        assert!(r.error.is_none());
        assert!(r.bytes_written > 0);
        assert!(r.bytes_read > 0);
        assert!(r.write_mb_s > 0.0 && r.write_mb_s.is_finite());
        assert_eq!(entries(root.path()), 0, "scratch directory must be removed");
    }

    #[test]
    fn test_throughput_floor() {
        let r = IoStressResult::from_counters(10 * 1024 * 1024, 20 * 1024 * 1024, 0.0, None);
        assert_eq!(r.read_mb_s, 10.0);
        assert_eq!(r.write_mb_s, 20.0);

        let r = IoStressResult::from_counters(1, 1, f64::NAN, None);
        assert!(r.read_mb_s.is_finite() && r.read_mb_s >= 0.0);
        assert_eq!(r.duration_s, 0.0);
    }

    #[test]
    fn test_throughput_above_floor() {
        let r = IoStressResult::from_counters(0, 40 * 1024 * 1024, 4.0, None);
        assert_eq!(r.write_mb_s, 10.0);
        assert_eq!(r.read_mb_s, 0.0);
    }

    #[test]
    fn test_missing_scratch_root_is_reported() {
        let mut runner = IoStressRunner::new(IoConfig {
            scratch_root: Some(PathBuf::from("/nonexistent/chronos/scratch")),
            ..small(Path::new("/"))
        });
        runner.start(Duration::from_millis(100)).unwrap();
        runner.stop();
        let r = runner.result();
        assert!(r.error.as_deref().unwrap().contains("scratch"));
        assert_eq!(r.bytes_written, 0);
        assert_eq!(r.read_mb_s, 0.0);
    }

    #[test]
    fn test_stop_before_deadline_is_prompt() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = IoStressRunner::new(small(root.path()));
        runner.start(Duration::from_secs(30)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        let asked = Instant::now();
        runner.stop();
        assert!(asked.elapsed() < Duration::from_secs(2));
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_result_before_start() {
        let mut runner = IoStressRunner::new(IoConfig::default());
        let r = runner.result();
        assert_eq!(r, IoStressResult::default());
    }

    #[test]
    fn test_deserialise_partial() {
        let r: IoStressResult =
            serde_json::from_str(r#"{"read_mb_s": 50, "write_mb_s": 30}"#).unwrap();
        assert_eq!(r.read_mb_s, 50.0);
        assert!(r.error.is_none());
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The runner lifecycle shared by every workload.

use crate::StressError;
use std::any::Any;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A workload with a `start` / `stop` / `result` lifecycle.
///
/// A runner is constructed per session, started once, stopped once, and
/// its result read after the stop (or after the deadline has passed).
/// Reading the result while workers are still running observes partial
/// state.
pub trait StressRunner {
    /// The aggregate produced once the workload has finished.
    type Output;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Launches the workload for `duration` and returns immediately.
    fn start(&mut self, duration: Duration) -> Result<(), StressError>;

    /// Requests termination and joins the workers within a bounded timeout.
    ///
    /// Never force-kills a worker in the middle of an iteration.
    fn stop(&mut self);

    /// Aggregates what the workers reported. Calling it again returns the
    /// same value.
    fn result(&mut self) -> Self::Output;

    /// Display label for what the runner is doing right now.
    fn current_subtest(&self) -> String;
}

/// Rejects zero-length runs.
pub(crate) fn validate_duration(duration: Duration) -> Result<(), StressError> {
    if duration.is_zero() {
        Err(StressError::InvalidDuration)
    } else {
        Ok(())
    }
}

/// Waits until `deadline` for a worker thread to finish.
///
/// Runners that own several threads pass the same deadline to every join,
/// so a stop never waits longer than one join timeout in total.
///
/// Returns `None` and detaches the thread if it is still running at the
/// deadline; the thread exits by itself at its next deadline check.
pub(crate) fn join_until<T>(
    handle: JoinHandle<T>,
    deadline: Instant,
) -> Option<std::thread::Result<T>> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!(
                worker = handle.thread().name().unwrap_or("unnamed"),
                "Worker still running at join deadline; detaching"
            );
            return None;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    Some(handle.join())
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}

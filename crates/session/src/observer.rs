// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Collaborators that consume what a session produces.

use crate::{Phase, SessionError};
use scoring::Report;
use std::time::Duration;
use telemetry::TelemetrySnapshot;

/// What the live display shows on each tick.
#[derive(Debug, Clone)]
pub struct LiveStatus {
    pub phase: Phase,
    /// The active runner's display label.
    pub subtest: String,
    /// Time since the session started.
    pub elapsed: Duration,
    /// Configured session length.
    pub total: Duration,
    pub phase_elapsed: Duration,
    pub telemetry: TelemetrySnapshot,
}

/// Receives progress while a session runs. All methods default to no-ops.
pub trait SessionObserver: Send {
    fn phase_started(&mut self, _phase: Phase, _budget: Duration) {}

    /// Called every display tick with full telemetry; never with minimal.
    fn tick(&mut self, _status: &LiveStatus) {}

    fn phase_finished(&mut self, _phase: Phase, _cancelled: bool) {}
}

/// An observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Receives the finished report, typically to persist it.
pub trait ReportSink: Send {
    fn deliver(&mut self, report: &Report) -> Result<(), SessionError>;
}

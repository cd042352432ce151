// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for telemetry collection.

use std::time::Duration;

/// Errors that can occur when reading platform telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to read a sysfs or procfs file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse a value from a system file or command output.
    #[error("failed to parse value from {path}: {detail}")]
    ParseError { path: String, detail: String },

    /// The source does not exist on this machine.
    #[error("telemetry source not available: {path}")]
    NotAvailable { path: String },

    /// An external diagnostic command could not be run or exited unsuccessfully.
    #[error("diagnostic command '{program}' failed: {detail}")]
    CommandFailed { program: String, detail: String },

    /// An external diagnostic command did not finish in time.
    #[error("diagnostic command '{program}' timed out after {timeout:?}")]
    CommandTimeout { program: String, timeout: Duration },

    /// The sampler was started twice.
    #[error("telemetry sampler is already running")]
    AlreadyRunning,

    /// The sampler was started outside a Tokio runtime.
    #[error("telemetry sampler requires a Tokio runtime")]
    NoRuntime,
}

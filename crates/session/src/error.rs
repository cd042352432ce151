// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for benchmark sessions.

/// Errors that can occur while configuring or running a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration is unreadable or invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A runner could not be started.
    #[error("stress error: {0}")]
    StressError(#[from] stress::StressError),

    /// The telemetry sampler could not be started.
    #[error("telemetry error: {0}")]
    TelemetryError(#[from] telemetry::TelemetryError),

    /// Writing the report failed.
    #[error("failed to write report to {path}: {source}")]
    PersistError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The report could not be serialised.
    #[error("report serialisation failed: {0}")]
    SerialiseError(#[from] serde_json::Error),
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # session
//!
//! Orchestrates a ChronosBench session: starts the telemetry sampler, runs
//! the CPU, I/O and mixed phases for their share of the configured
//! duration, and assembles the [`scoring::Report`].
//!
//! Display and persistence are collaborators behind the
//! [`SessionObserver`] and [`ReportSink`] traits. [`ReportWriter`] is the
//! file-based sink.
//!
//! ```no_run
//! use session::{BenchmarkSession, NullObserver, ReportWriter, SessionConfig};
//!
//! # async fn demo() -> Result<(), session::SessionError> {
//! let config = SessionConfig::default();
//! let mut writer = ReportWriter::new(config.reports_dir.clone());
//! let session = BenchmarkSession::new(config)?;
//! let report = session.run(&mut NullObserver, &mut writer).await?;
//! println!("composite: {}", report.scores().composite);
//! # Ok(())
//! # }
//! ```

mod cancel;
pub mod config;
mod error;
mod observer;
mod phase;
mod session;
mod writer;

pub use cancel::CancelToken;
pub use config::{DurationTier, SessionConfig, TelemetryLevel};
pub use error::SessionError;
pub use observer::{LiveStatus, NullObserver, ReportSink, SessionObserver};
pub use phase::Phase;
pub use session::BenchmarkSession;
pub use writer::{ReportPaths, ReportWriter};

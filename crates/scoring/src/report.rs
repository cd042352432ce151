// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The benchmark report.
//!
//! A [`Report`] is assembled once at the end of a session and has no
//! mutating methods. Its JSON form is the persisted artifact:
//!
//! ```text
//! { "meta":    { platform, timestamp, schema_version, tool_version, duration_s, cancelled },
//!   "results": { cpu?, io?, mixed?, telemetry? },
//!   "scores":  { "scores": { cpu?, gpu?, io?, responsiveness? }, "composite": n } }
//! ```

use crate::{score_results, ScoreSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stress::{CpuStressResult, IoStressResult, MixedLoadResult};
use telemetry::{Platform, TelemetrySnapshot};

/// Version of the report layout written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Where and when a report was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportMeta {
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub schema_version: u32,
    pub tool_version: String,
    /// Configured session length in seconds.
    pub duration_s: u64,
    /// The run was cut short by the user.
    pub cancelled: bool,
}

impl Default for ReportMeta {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            timestamp: DateTime::<Utc>::default(),
            schema_version: SCHEMA_VERSION,
            tool_version: String::new(),
            duration_s: 0,
            cancelled: false,
        }
    }
}

impl ReportMeta {
    /// Metadata stamped with the current time.
    pub fn now(platform: Platform, tool_version: &str, duration_s: u64, cancelled: bool) -> Self {
        Self {
            platform,
            timestamp: Utc::now(),
            schema_version: SCHEMA_VERSION,
            tool_version: tool_version.to_string(),
            duration_s,
            cancelled,
        }
    }
}

/// Per-runner results. A phase that never ran is absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuStressResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io: Option<IoStressResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixed: Option<MixedLoadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetrySnapshot>,
}

/// A complete, immutable benchmark report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    meta: ReportMeta,
    #[serde(default)]
    results: BenchResults,
    #[serde(default)]
    scores: ScoreSet,
}

impl Report {
    /// Builds the report and computes its scores.
    pub fn assemble(meta: ReportMeta, results: BenchResults) -> Self {
        let scores = score_results(&results);
        Self {
            meta,
            results,
            scores,
        }
    }

    /// Parses a persisted report. Stored scores are kept as-is; use
    /// [`crate::score`] to recompute them.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn meta(&self) -> &ReportMeta {
        &self.meta
    }

    pub fn results(&self) -> &BenchResults {
        &self.results
    }

    /// Scores computed when the report was assembled (or as loaded).
    pub fn scores(&self) -> &ScoreSet {
        &self.scores
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # scoring
//!
//! The [`Report`] a session produces and the pure [`score`] reduction
//! that turns its results into a bounded [`ScoreSet`].
//!
//! Scoring has no knowledge of runner lifecycles and no side effects: the
//! same results always give the same scores.

mod report;
mod score;

pub use report::{BenchResults, Report, ReportMeta, SCHEMA_VERSION};
pub use score::{score, score_results, CategoryScores, ScoreSet, SCORE_CAP};

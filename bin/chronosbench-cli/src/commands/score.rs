// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `chronosbench score` command: recompute the scores of a saved report.

use super::header;
use scoring::{score, Report};
use std::path::PathBuf;

pub fn execute(path: PathBuf) -> anyhow::Result<()> {
    header("ChronosBench X · Report Scoring");

    let json = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("cannot read '{}': {e}", path.display()))?;
    let report = Report::from_json(&json)?;
    let fresh = score(&report);
    let meta = report.meta();

    println!("  Report");
    println!("   File:         {}", path.display());
    println!("   Platform:     {}", meta.platform);
    println!("   Timestamp:    {}", meta.timestamp.to_rfc3339());
    println!("   Tool version: {}", meta.tool_version);
    println!("   Duration:     {} s", meta.duration_s);
    if meta.cancelled {
        println!("   Status:       aborted by user (partial results)");
    }
    println!();

    let show = |v: Option<u32>| v.map_or_else(|| "n/a".to_string(), |s| s.to_string());
    println!("  Scores");
    println!("   CPU:            {}", show(fresh.scores.cpu));
    println!("   GPU:            {}", show(fresh.scores.gpu));
    println!("   I/O:            {}", show(fresh.scores.io));
    println!("   Responsiveness: {}", show(fresh.scores.responsiveness));
    println!(
        "   Composite:      {} / {}",
        fresh.composite,
        scoring::SCORE_CAP
    );

    let stored = report.scores();
    if *stored != fresh {
        println!();
        println!(
            "   Note: stored composite was {}; scores above are recomputed.",
            stored.composite
        );
    }
    println!();

    Ok(())
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `chronosbench run` command: run a full session and save the report.
//!
//! ```text
//! CPU Stress (1/2) → I/O Stress (1/4) → Mixed Thermal Sweep (1/4) → score → save
//! ```
//!
//! Ctrl+C cancels the active phase; the partial report is still scored
//! and saved.

use super::{header, load_config};
use scoring::Report;
use session::{
    BenchmarkSession, DurationTier, LiveStatus, Phase, ReportWriter, SessionConfig,
    SessionObserver, TelemetryLevel,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use telemetry::Platform;

/// Flags accepted by `run`.
pub struct RunOptions {
    pub tier: DurationTier,
    pub duration: Option<u64>,
    pub platform: Option<Platform>,
    pub telemetry: TelemetryLevel,
    pub reports_dir: PathBuf,
}

impl RunOptions {
    fn into_config(self) -> SessionConfig {
        let mut config = SessionConfig::default().with_tier(self.tier);
        if let Some(secs) = self.duration {
            config.duration_s = secs;
        }
        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        config.telemetry_level = self.telemetry;
        config.reports_dir = self.reports_dir;
        config
    }
}

pub async fn execute(config_path: Option<PathBuf>, options: RunOptions) -> anyhow::Result<()> {
    header("ChronosBench X · Benchmark Session");

    let config = match load_config(config_path.as_deref())? {
        Some(config) => config,
        None => options.into_config(),
    };

    // ── Configuration ──────────────────────────────────────────
    println!("  Config:");
    println!("   Duration:   {} s", config.duration_s);
    println!("   Platform:   {}", config.platform);
    println!("   Telemetry:  {:?}", config.telemetry_level);
    println!(
        "   Workers:    {}",
        std::thread::available_parallelism().map_or(1, |n| n.get())
    );
    match stress::accelerator::detect() {
        Some(cap) => println!("   Accelerator: {} ({})", cap.adapter, cap.backend),
        None => println!("   Accelerator: none (CPU fallback)"),
    }
    println!("   Reports:    {}", config.reports_dir.display());
    println!();
    println!("  Press Ctrl+C to abort; a partial report is still saved.");
    println!();

    let mut writer = ReportWriter::new(config.reports_dir.clone());
    let live = config.telemetry_level == TelemetryLevel::Full;
    let session = BenchmarkSession::new(config)?;

    let token = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let mut observer = ConsoleObserver { live };
    let report = session.run(&mut observer, &mut writer).await?;

    println!();
    print_results(&report);
    match writer.last_written() {
        Some(paths) => {
            println!("  Saved:");
            println!("   {}", paths.json.display());
            println!("   {}", paths.text.display());
        }
        None => println!("  Report could not be saved; see log output."),
    }

    Ok(())
}

/// Renders session progress on stdout.
struct ConsoleObserver {
    live: bool,
}

impl SessionObserver for ConsoleObserver {
    fn phase_started(&mut self, phase: Phase, budget: Duration) {
        println!("  ▶ {phase} ({} s)", budget.as_secs());
    }

    fn tick(&mut self, status: &LiveStatus) {
        let line = format!(
            "    {:>4.0}/{:.0}s  {:<28}  {}",
            status.elapsed.as_secs_f64(),
            status.total.as_secs_f64(),
            status.subtest,
            status.telemetry.summary(),
        );
        let mut out = std::io::stdout().lock();
        // Best effort; a closed stdout must not end the session.
        let _ = write!(out, "\r{line:<120}");
        let _ = out.flush();
    }

    fn phase_finished(&mut self, phase: Phase, cancelled: bool) {
        if self.live {
            println!();
        }
        if cancelled {
            println!("  ✗ {phase} aborted by user");
        } else {
            println!("  ✓ {phase}");
        }
    }
}

fn print_results(report: &Report) {
    let scores = &report.scores().scores;
    let show = |v: Option<u32>| v.map_or_else(|| "n/a".to_string(), |s| s.to_string());

    println!("  ┌──────────────── Result ────────────────┐");
    if report.meta().cancelled {
        println!("  │  Aborted by user (partial results)     │");
    }
    println!("  │  CPU:             {:>20} │", show(scores.cpu));
    println!("  │  GPU:             {:>20} │", show(scores.gpu));
    println!("  │  I/O:             {:>20} │", show(scores.io));
    println!("  │  Responsiveness:  {:>20} │", show(scores.responsiveness));
    println!("  │                                        │");
    println!(
        "  │  Composite:       {:>13} / {} │",
        report.scores().composite,
        scoring::SCORE_CAP
    );
    println!("  └────────────────────────────────────────┘");
    println!();

    if let Some(cpu) = &report.results().cpu {
        println!(
            "  CPU:  {} ops on {} workers ({} failed)",
            cpu.cpu_ops, cpu.processes_used, cpu.failed_workers
        );
    }
    if let Some(io) = &report.results().io {
        match &io.error {
            Some(e) => println!("  I/O:  failed: {e}"),
            None => println!(
                "  I/O:  read {:.1} MB/s, write {:.1} MB/s",
                io.read_mb_s, io.write_mb_s
            ),
        }
    }
    if let Some(t) = &report.results().telemetry {
        println!("  Last: {}", t.summary());
    }
    println!();
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # chronosbench
//!
//! Command-line interface for ChronosBench X.
//!
//! ## Usage
//! ```bash
//! # Standard three-minute session with live telemetry
//! chronosbench run --tier standard
//!
//! # Quick session, scores only, reports under ./out
//! chronosbench run --tier quick --telemetry minimal --reports-dir ./out
//!
//! # One telemetry reading
//! chronosbench status
//!
//! # Accelerator capability, plus a 10 s accelerator run
//! chronosbench probe --run-s 10
//!
//! # Re-score a saved report
//! chronosbench score reports/chronosbenchx_2025-01-01_12-00-00.json
//! ```

mod commands;

use clap::{Parser, Subcommand};
use session::{DurationTier, TelemetryLevel};
use telemetry::Platform;

#[derive(Parser)]
#[command(
    name = "chronosbench",
    about = "Cross-platform CPU, I/O and accelerator stress benchmark with telemetry",
    version,
    author
)]
struct Cli {
    /// Path to a TOML session configuration (overrides CLI arguments).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark session and save the report.
    Run {
        /// Session length: quick (~1 min), standard (~3 min), extended (~8 min).
        #[arg(short, long, default_value = "standard")]
        tier: DurationTier,

        /// Exact session length in seconds (overrides --tier).
        #[arg(short, long)]
        duration: Option<u64>,

        /// Probe chain to use: macos, windows, linux. Defaults to the host.
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Telemetry detail: full (live display, power/GPU probes) or minimal.
        #[arg(long, default_value = "full")]
        telemetry: TelemetryLevel,

        /// Directory for the JSON and text reports.
        #[arg(long, default_value = "reports")]
        reports_dir: std::path::PathBuf,
    },

    /// Display one telemetry reading for this machine.
    Status {
        /// Sampling window in milliseconds.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Skip external power/GPU probes.
        #[arg(long)]
        no_probes: bool,
    },

    /// Report accelerator capability and platform probe availability.
    Probe {
        /// Also run the accelerator workload for this many seconds.
        #[arg(long)]
        run_s: Option<u64>,
    },

    /// Recompute the scores of a saved JSON report.
    Score {
        /// Path to the report JSON.
        report: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            tier,
            duration,
            platform,
            telemetry,
            reports_dir,
        } => {
            let options = commands::run::RunOptions {
                tier,
                duration,
                platform,
                telemetry,
                reports_dir,
            };
            commands::run::execute(cli.config, options).await
        }
        Commands::Status {
            interval_ms,
            no_probes,
        } => commands::status::execute(cli.config, interval_ms, !no_probes).await,
        Commands::Probe { run_s } => commands::probe::execute(cli.config, run_s).await,
        Commands::Score { report } => commands::score::execute(report),
    }
}

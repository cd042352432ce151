// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `chronosbench status` command: one telemetry reading.
//!
//! Takes two samples `interval_ms` apart so utilisation and throughput
//! are rates over that window. Sources missing on this machine show `n/a`.

use super::{header, load_config, opt};
use std::path::PathBuf;
use std::time::Duration;
use telemetry::{Platform, TelemetryCollector, TelemetrySnapshot};

pub async fn execute(
    config_path: Option<PathBuf>,
    interval_ms: u64,
    probes: bool,
) -> anyhow::Result<()> {
    header("ChronosBench X · System Telemetry");

    let (platform, probe_timeout) = match load_config(config_path.as_deref())? {
        Some(config) => (config.platform, config.probe_timeout()),
        None => (Platform::current(), Duration::from_secs(3)),
    };

    let mut collector = TelemetryCollector::new(platform, probes, probe_timeout);
    tokio::time::sleep(Duration::from_millis(interval_ms.max(100))).await;
    let snapshot = collector.collect().await;

    print_snapshot(platform, &snapshot);
    println!("{}", snapshot.summary());

    Ok(())
}

fn print_snapshot(platform: Platform, s: &TelemetrySnapshot) {
    // ── CPU ────────────────────────────────────────────────────
    println!("  CPU");
    println!(
        "   Utilisation:  {:.1}%  {}",
        s.cpu_percent,
        usage_bar(s.cpu_percent / 100.0)
    );
    match s.cpu_temp {
        Some(t) => println!("   Temperature:  {t:.1} C  {}", temp_bar(t)),
        None => println!("   Temperature:  n/a"),
    }
    println!("   Frequency:    {}", opt(s.cpu_freq, "MHz"));
    println!("   Power:        {}", opt(s.cpu_power_w, "W"));
    println!();

    // ── Memory ─────────────────────────────────────────────────
    println!("  Memory");
    let ratio = if s.mem_total_gb > 0.0 {
        s.mem_used_gb / s.mem_total_gb
    } else {
        0.0
    };
    println!(
        "   Used:         {:.2} / {:.2} GB  {}",
        s.mem_used_gb,
        s.mem_total_gb,
        usage_bar(ratio)
    );
    println!();

    // ── Disk ───────────────────────────────────────────────────
    println!("  Disk");
    println!("   Read:         {:.2} MB/s", s.io_read_mb_s);
    println!("   Write:        {:.2} MB/s", s.io_write_mb_s);
    println!();

    // ── GPU ────────────────────────────────────────────────────
    println!("  GPU ({platform})");
    match &s.probe {
        Some(probe) => println!("   Source:       {probe}"),
        None => println!("   Source:       no probe answered"),
    }
    println!("   Utilisation:  {}", opt(s.gpu_percent, "%"));
    println!("   Temperature:  {}", opt(s.gpu_temp, "C"));
    println!("   Power:        {}", opt(s.gpu_power_w, "W"));
    println!();
}

/// Creates a visual temperature bar (0-100 C scale).
fn temp_bar(celsius: f64) -> String {
    let symbol = if celsius >= 80.0 {
        "#"
    } else if celsius >= 60.0 {
        "="
    } else {
        "-"
    };
    bar(celsius / 100.0, symbol)
}

/// Creates a visual usage bar (0.0-1.0 scale).
fn usage_bar(ratio: f64) -> String {
    let symbol = if ratio >= 0.9 {
        "#"
    } else if ratio >= 0.7 {
        "="
    } else {
        "-"
    };
    bar(ratio, symbol)
}

fn bar(ratio: f64, symbol: &str) -> String {
    let filled = ((ratio.max(0.0)) * 20.0).round() as usize;
    let filled = filled.min(20);
    format!("[{}{}]", symbol.repeat(filled), ".".repeat(20 - filled))
}

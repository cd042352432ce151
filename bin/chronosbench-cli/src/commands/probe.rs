// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `chronosbench probe` command: what this machine can report and run.
//!
//! Lists the accelerator capability found by the process-wide probe and
//! tries each platform telemetry probe in chain order. With `--run-s` it
//! also runs the accelerator workload (or its CPU fallback) and prints
//! the resulting snapshot.

use super::{header, load_config, opt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stress::{AcceleratorComputeRunner, AcceleratorConfig};
use telemetry::{Platform, ProbeKind};

pub async fn execute(config_path: Option<PathBuf>, run_s: Option<u64>) -> anyhow::Result<()> {
    header("ChronosBench X · Capability Probe");

    let config = load_config(config_path.as_deref())?;
    let platform = config
        .as_ref()
        .map_or_else(Platform::current, |c| c.platform);
    let probe_timeout = config
        .as_ref()
        .map_or(Duration::from_secs(3), |c| c.probe_timeout());

    // ── Accelerator ────────────────────────────────────────────
    println!("  Accelerator");
    match stress::accelerator::detect() {
        Some(cap) => {
            println!("   Adapter:      {}", cap.adapter);
            println!("   Backend:      {}", cap.backend);
            println!("   Kind:         {:?}", cap.kind);
        }
        None => {
            println!("   Adapter:      none");
            println!("   Backend:      {}", stress::accelerator::FALLBACK_BACKEND);
        }
    }
    println!();

    // ── Platform probes ────────────────────────────────────────
    println!("  Telemetry probes ({platform})");
    for &kind in ProbeKind::chain(platform) {
        match kind.read(probe_timeout).await {
            Ok(reading) => println!(
                "   {:<14} ok   GPU {} | {} | {} · CPU {}",
                kind.name(),
                opt(reading.gpu_percent, "%"),
                opt(reading.gpu_temp, "C"),
                opt(reading.gpu_power_w, "W"),
                opt(reading.cpu_power_w, "W"),
            ),
            Err(e) => println!("   {:<14} --   {e}", kind.name()),
        }
    }
    println!();

    let Some(secs) = run_s.filter(|s| *s > 0) else {
        return Ok(());
    };

    // ── Accelerator run ────────────────────────────────────────
    println!("  Running accelerator workload for {secs} s (Ctrl+C to stop)...");
    let accelerator_config = AcceleratorConfig {
        fallback_matrix_size: config
            .as_ref()
            .map_or(256, |c| c.kernels.fallback_matrix_size),
        ..Default::default()
    };
    let runner = AcceleratorComputeRunner::new(accelerator_config);
    let stop = Arc::new(AtomicBool::new(false));

    let signal_stop = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_stop.store(true, Ordering::Relaxed);
        }
    });

    let snapshot = tokio::task::spawn_blocking(move || {
        runner.run(Duration::from_secs(secs), &stop)
    })
    .await?;

    println!();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if let Some(per_pass) = snapshot.seconds_per_pass() {
        println!();
        println!("  {:.4} s per pass", per_pass);
    }

    Ok(())
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

pub mod probe;
pub mod run;
pub mod score;
pub mod status;

use session::SessionConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads `--config` if given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SessionConfig>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let config = SessionConfig::from_file(path)?;
    tracing::info!(path = %path.display(), "Loaded configuration");
    Ok(Some(config))
}

/// Prints the boxed command header.
pub fn header(title: &str) {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║ {:^52} ║", title);
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
}

/// Formats an optional reading, `n/a` when absent.
pub fn opt(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1} {unit}"),
        None => "n/a".to_string(),
    }
}

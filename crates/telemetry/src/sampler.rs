// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Background telemetry loop.
//!
//! The sampler runs a [`TelemetryCollector`] on a Tokio task at a fixed
//! interval and publishes each snapshot through a `watch` channel with
//! `send_replace`, so readers always get a whole record. Stopping is
//! cooperative: the loop exits after the tick in flight, and an external
//! probe invocation is only ever cut short by its own timeout.

use crate::{Platform, TelemetryCollector, TelemetryError, TelemetrySnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Sampler settings.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Selects the probe chain.
    pub platform: Platform,
    /// Whether to invoke the external GPU/power probes at all.
    pub platform_probes: bool,
    /// Upper bound on a single external probe invocation.
    pub probe_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            platform: Platform::current(),
            platform_probes: true,
            probe_timeout: Duration::from_secs(3),
        }
    }
}

/// Periodic telemetry sampler with a non-blocking latest-snapshot read.
pub struct TelemetrySampler {
    config: SamplerConfig,
    latest: Arc<watch::Sender<TelemetrySnapshot>>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl TelemetrySampler {
    pub fn new(config: SamplerConfig) -> Self {
        let (latest, _) = watch::channel(TelemetrySnapshot::default());
        Self {
            config,
            latest: Arc::new(latest),
            shutdown: None,
            task: None,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Spawns the sampling loop on the current Tokio runtime.
    pub fn start(&mut self) -> Result<(), TelemetryError> {
        if self.task.is_some() {
            return Err(TelemetryError::AlreadyRunning);
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| TelemetryError::NoRuntime)?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let latest = Arc::clone(&self.latest);
        let interval = self.config.interval;
        let mut collector = TelemetryCollector::new(
            self.config.platform,
            self.config.platform_probes,
            self.config.probe_timeout,
        );

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            platform = %self.config.platform,
            probes = self.config.platform_probes,
            "Telemetry sampler started"
        );

        self.task = Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                let snapshot = collector.collect().await;
                latest.send_replace(snapshot);
                if *stop_rx.borrow() {
                    break;
                }
            }
            tracing::debug!("Telemetry loop exited");
        }));
        self.shutdown = Some(stop_tx);
        Ok(())
    }

    /// The most recently published snapshot.
    ///
    /// Before the first tick completes this is [`TelemetrySnapshot::default()`].
    pub fn latest_snapshot(&self) -> TelemetrySnapshot {
        self.latest.borrow().clone()
    }

    /// A receiver that is notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.latest.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signals the loop to exit and waits for the in-flight tick.
    ///
    /// The wait is bounded by the worst case of one full probe chain; if
    /// that elapses the task is aborted. The last published snapshot stays
    /// readable afterwards.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }

        let bound = self.config.probe_timeout * 2 + Duration::from_secs(1);
        let abort = task.abort_handle();
        match tokio::time::timeout(bound, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Telemetry task ended abnormally"),
            Err(_) => {
                tracing::warn!(timeout = ?bound, "Telemetry task did not stop in time; aborting");
                abort.abort();
            }
        }
        tracing::info!("Telemetry sampler stopped");
    }
}

impl Drop for TelemetrySampler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

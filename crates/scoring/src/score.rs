// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pure reduction from report results to bounded scores.
//!
//! | Category | Source | Formula |
//! |---|---|---|
//! | cpu | `cpu.matmul_duration_s`, `cpu.fft_duration_s` | `Σ 1/max(d, 1e-3) × 10` |
//! | gpu | `mixed.gpu.duration_s / mixed.gpu.passes` | `100 / max(d, 1e-3)` |
//! | io | `io.read_mb_s`, `io.write_mb_s` | `(r + w) / 20` |
//! | responsiveness | `telemetry.cpu_percent`, `telemetry.cpu_temp` | `((u + (100 − |T − 60|)) / 2) × 10` |
//!
//! Every score is floored to an integer and clamped to `[0, 2000]`. A
//! category is present only when its source metrics are; the composite is
//! the mean of the present categories, or 0 when there are none.

use crate::{BenchResults, Report};
use serde::{Deserialize, Serialize};

/// Upper bound of every score.
pub const SCORE_CAP: u32 = 2000;

const MIN_DURATION_S: f64 = 1e-3;
const CPU_SCALE: f64 = 10.0;
const GPU_SCALE: f64 = 100.0;
const IO_DIVISOR: f64 = 20.0;
const REFERENCE_TEMP_C: f64 = 60.0;
const RESPONSIVENESS_SCALE: f64 = 10.0;

/// Per-category scores; absent categories are omitted from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsiveness: Option<u32>,
}

impl CategoryScores {
    fn present(&self) -> impl Iterator<Item = u32> {
        [self.cpu, self.gpu, self.io, self.responsiveness]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreSet {
    pub scores: CategoryScores,
    pub composite: u32,
}

/// Scores a report from its results. Stored scores are ignored.
pub fn score(report: &Report) -> ScoreSet {
    score_results(report.results())
}

/// Scores a set of results.
pub fn score_results(results: &BenchResults) -> ScoreSet {
    let scores = CategoryScores {
        cpu: cpu_score(results),
        gpu: gpu_score(results),
        io: io_score(results),
        responsiveness: responsiveness_score(results),
    };
    let (sum, count) = scores
        .present()
        .fold((0u64, 0u64), |(s, c), v| (s + u64::from(v), c + 1));
    let composite = if count == 0 {
        0
    } else {
        bounded(sum as f64 / count as f64)
    };
    ScoreSet { scores, composite }
}

/// Floors and clamps to `[0, SCORE_CAP]`; NaN maps to 0.
fn bounded(raw: f64) -> u32 {
    if raw.is_nan() {
        return 0;
    }
    raw.floor().clamp(0.0, f64::from(SCORE_CAP)) as u32
}

fn inverse(duration_s: f64) -> f64 {
    1.0 / duration_s.max(MIN_DURATION_S)
}

fn cpu_score(results: &BenchResults) -> Option<u32> {
    let cpu = results.cpu.as_ref()?;
    let durations: Vec<f64> = [cpu.matmul_duration_s, cpu.fft_duration_s]
        .into_iter()
        .flatten()
        .collect();
    if durations.is_empty() {
        return None;
    }
    Some(bounded(
        durations.into_iter().map(inverse).sum::<f64>() * CPU_SCALE,
    ))
}

fn gpu_score(results: &BenchResults) -> Option<u32> {
    let per_pass = results.mixed.as_ref()?.gpu.seconds_per_pass()?;
    Some(bounded(GPU_SCALE * inverse(per_pass)))
}

fn io_score(results: &BenchResults) -> Option<u32> {
    let io = results.io.as_ref()?;
    if io.error.is_some() {
        return None;
    }
    let total = io.read_mb_s.max(0.0) + io.write_mb_s.max(0.0);
    Some(bounded(total / IO_DIVISOR))
}

fn responsiveness_score(results: &BenchResults) -> Option<u32> {
    let t = results.telemetry.as_ref()?;
    let temp = t.cpu_temp?;
    let thermal = 100.0 - (temp - REFERENCE_TEMP_C).abs();
    Some(bounded(
        (t.cpu_percent + thermal) / 2.0 * RESPONSIVENESS_SCALE,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReportMeta;
    use stress::{
        AcceleratorSnapshot, CpuStressResult, GpuOutcome, IoStressResult, MixedLoadResult,
    };
    use telemetry::TelemetrySnapshot;

    fn io(read: f64, write: f64) -> IoStressResult {
        IoStressResult {
            read_mb_s: read,
            write_mb_s: write,
            ..Default::default()
        }
    }

    #[test]
    fn test_io_only_report() {
        let results = BenchResults {
            io: Some(io(50.0, 30.0)),
            ..Default::default()
        };
        let s = score_results(&results);
        assert_eq!(s.scores.io, Some(4));
        assert_eq!(s.composite, 4);
        assert_eq!(s.scores.cpu, None);
        assert_eq!(s.scores.gpu, None);
        assert_eq!(s.scores.responsiveness, None);

        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["scores"], serde_json::json!({"io": 4}));
    }

    #[test]
    fn test_empty_results_score_zero() {
        let s = score_results(&BenchResults::default());
        assert_eq!(s, ScoreSet::default());
        assert_eq!(s.composite, 0);
    }

    #[test]
    fn test_cpu_score() {
        let cpu = CpuStressResult {
            matmul_duration_s: Some(0.05),
            fft_duration_s: Some(0.1),
            ..Default::default()
        };
        let results = BenchResults {
            cpu: Some(cpu),
            ..Default::default()
        };
        // (20 + 10) × 10
        assert_eq!(score_results(&results).scores.cpu, Some(300));
    }

    #[test]
    fn test_cpu_score_with_one_duration() {
        let cpu = CpuStressResult {
            fft_duration_s: Some(0.5),
            ..Default::default()
        };
        let results = BenchResults {
            cpu: Some(cpu),
            ..Default::default()
        };
        assert_eq!(score_results(&results).scores.cpu, Some(20));
    }

    #[test]
    fn test_cpu_without_durations_is_absent() {
        let results = BenchResults {
            cpu: Some(CpuStressResult::default()),
            ..Default::default()
        };
        assert_eq!(score_results(&results).scores.cpu, None);
    }

    #[test]
    fn test_scores_are_capped() {
        let cpu = CpuStressResult {
            matmul_duration_s: Some(0.0),
            fft_duration_s: Some(1e-9),
            ..Default::default()
        };
        let results = BenchResults {
            cpu: Some(cpu),
            io: Some(io(1e9, 1e9)),
            ..Default::default()
        };
        let s = score_results(&results);
        assert_eq!(s.scores.cpu, Some(SCORE_CAP));
        assert_eq!(s.scores.io, Some(SCORE_CAP));
        assert_eq!(s.composite, SCORE_CAP);
    }

    #[test]
    fn test_gpu_score() {
        let snapshot = AcceleratorSnapshot::Completed {
            passes: 20,
            duration_s: 10.0,
            current_test: "Particle Simulation (device)".into(),
            backend: "metal".into(),
        };
        let results = BenchResults {
            mixed: Some(MixedLoadResult {
                gpu: GpuOutcome::Snapshot(snapshot),
                ..Default::default()
            }),
            ..Default::default()
        };
        // 100 / 0.5
        assert_eq!(score_results(&results).scores.gpu, Some(200));
    }

    #[test]
    fn test_gpu_unavailable_or_failed_is_absent() {
        for gpu in [
            GpuOutcome::default(),
            GpuOutcome::Snapshot(AcceleratorSnapshot::Failed { error: "lost".into() }),
        ] {
            let results = BenchResults {
                mixed: Some(MixedLoadResult {
                    gpu,
                    ..Default::default()
                }),
                ..Default::default()
            };
            assert_eq!(score_results(&results).scores.gpu, None);
        }
    }

    #[test]
    fn test_io_error_excludes_category() {
        let mut failed = io(100.0, 100.0);
        failed.error = Some("disk full".into());
        let results = BenchResults {
            io: Some(failed),
            ..Default::default()
        };
        let s = score_results(&results);
        assert_eq!(s.scores.io, None);
        assert_eq!(s.composite, 0);
    }

    #[test]
    fn test_responsiveness() {
        let results = BenchResults {
            telemetry: Some(TelemetrySnapshot {
                cpu_percent: 80.0,
                cpu_temp: Some(70.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        // ((80 + 90) / 2) × 10
        assert_eq!(score_results(&results).scores.responsiveness, Some(850));
    }

    #[test]
    fn test_responsiveness_needs_temperature() {
        let results = BenchResults {
            telemetry: Some(TelemetrySnapshot {
                cpu_percent: 80.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(score_results(&results).scores.responsiveness, None);
    }

    #[test]
    fn test_responsiveness_never_negative() {
        let results = BenchResults {
            telemetry: Some(TelemetrySnapshot {
                cpu_percent: 0.0,
                cpu_temp: Some(400.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(score_results(&results).scores.responsiveness, Some(0));
    }

    #[test]
    fn test_composite_is_mean_of_present() {
        let results = BenchResults {
            io: Some(io(50.0, 30.0)),
            telemetry: Some(TelemetrySnapshot {
                cpu_percent: 80.0,
                cpu_temp: Some(70.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        // (4 + 850) / 2
        assert_eq!(score_results(&results).composite, 427);
    }

    #[test]
    fn test_score_is_pure() {
        let report = Report::assemble(
            ReportMeta::default(),
            BenchResults {
                io: Some(io(12.0, 8.0)),
                ..Default::default()
            },
        );
        let before = report.clone();
        assert_eq!(score(&report), score(&report));
        assert_eq!(score(&report), *report.scores());
        assert_eq!(report, before);
    }

    #[test]
    fn test_bounded() {
        assert_eq!(bounded(f64::NAN), 0);
        assert_eq!(bounded(f64::INFINITY), SCORE_CAP);
        assert_eq!(bounded(-5.0), 0);
        assert_eq!(bounded(3.99), 3);
    }
}

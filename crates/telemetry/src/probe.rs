// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Platform power/thermal probes.
//!
//! Accelerator telemetry has no portable kernel interface, so it comes
//! from vendor diagnostic tools whose text output is pattern-matched. Each
//! platform has an ordered chain: a high-fidelity primary probe and a
//! lower-fidelity secondary one. The first probe that yields any value
//! wins the tick; if every probe fails the reading is empty.
//!
//! | Platform | Primary | Secondary |
//! |---|---|---|
//! | macOS | `powermetrics` (needs passwordless sudo) | `ioreg` IOAccelerator stats |
//! | Linux | `nvidia-smi` | DRM sysfs (`gpu_busy_percent`, hwmon) |
//! | Windows | `nvidia-smi` | none |

use crate::thermal::read_sysfs_file;
use crate::{Platform, TelemetryError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

const DRM_BASE: &str = "/sys/class/drm";

// powermetrics --samplers cpu_power,gpu_power,smc
static GPU_RESIDENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)GPU (?:HW )?active residency:\s*([\d.]+)\s*%").expect("valid regex")
});
static GPU_TEMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)GPU die temperature:\s*([\d.]+)").expect("valid regex"));
static CPU_TEMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CPU die temperature:\s*([\d.]+)").expect("valid regex"));
static GPU_POWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)GPU Power:\s*([\d.]+)\s*(mW|W)\b").expect("valid regex"));
static CPU_POWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CPU Power:\s*([\d.]+)\s*(mW|W)\b").expect("valid regex"));

// ioreg -r -d 1 -c IOAccelerator
static DEVICE_UTILISATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""Device Utilization %"\s*=\s*(\d+)"#).expect("valid regex")
});

/// Values extracted by one probe invocation. `None` means the probe did
/// not report that quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct ProbeReading {
    pub gpu_percent: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub gpu_power_w: Option<f64>,
    pub cpu_power_w: Option<f64>,
    pub cpu_temp: Option<f64>,
}

impl ProbeReading {
    pub fn is_empty(&self) -> bool {
        self.gpu_percent.is_none()
            && self.gpu_temp.is_none()
            && self.gpu_power_w.is_none()
            && self.cpu_power_w.is_none()
            && self.cpu_temp.is_none()
    }
}

/// A single probe implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Powermetrics,
    Ioreg,
    NvidiaSmi,
    DrmSysfs,
}

impl ProbeKind {
    /// The probe chain for `platform`, primary first.
    pub fn chain(platform: Platform) -> &'static [ProbeKind] {
        match platform {
            Platform::Macos => &[ProbeKind::Powermetrics, ProbeKind::Ioreg],
            Platform::Linux => &[ProbeKind::NvidiaSmi, ProbeKind::DrmSysfs],
            Platform::Windows => &[ProbeKind::NvidiaSmi],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Powermetrics => "powermetrics",
            Self::Ioreg => "ioreg",
            Self::NvidiaSmi => "nvidia-smi",
            Self::DrmSysfs => "drm-sysfs",
        }
    }

    /// Runs the probe once. External commands are bounded by `timeout`.
    pub async fn read(self, timeout: Duration) -> Result<ProbeReading, TelemetryError> {
        match self {
            Self::Powermetrics => {
                let out = run_diagnostic(
                    "sudo",
                    &[
                        "-n",
                        "powermetrics",
                        "--samplers",
                        "cpu_power,gpu_power,smc",
                        "-n",
                        "1",
                        "-i",
                        "200",
                    ],
                    timeout,
                )
                .await?;
                parse_powermetrics(&out)
            }
            Self::Ioreg => {
                let out =
                    run_diagnostic("ioreg", &["-r", "-d", "1", "-c", "IOAccelerator"], timeout)
                        .await?;
                parse_ioreg(&out)
            }
            Self::NvidiaSmi => {
                let out = run_diagnostic(
                    "nvidia-smi",
                    &[
                        "--query-gpu=utilization.gpu,temperature.gpu,power.draw",
                        "--format=csv,noheader,nounits",
                    ],
                    timeout,
                )
                .await?;
                parse_nvidia_smi(&out)
            }
            Self::DrmSysfs => read_drm(Path::new(DRM_BASE)),
        }
    }
}

/// Walks the chain for `platform` and returns the first non-empty reading
/// together with the probe that produced it.
pub async fn probe_chain(
    platform: Platform,
    timeout: Duration,
) -> Option<(ProbeKind, ProbeReading)> {
    for &kind in ProbeKind::chain(platform) {
        match kind.read(timeout).await {
            Ok(reading) if !reading.is_empty() => {
                tracing::trace!(probe = kind.name(), ?reading, "probe succeeded");
                return Some((kind, reading));
            }
            Ok(_) => tracing::debug!(probe = kind.name(), "probe returned no values"),
            Err(e) => tracing::debug!(probe = kind.name(), error = %e, "probe failed"),
        }
    }
    None
}

/// Runs an external command and returns its stdout.
///
/// The child is killed if `timeout` elapses first. A non-zero exit status
/// is an error.
pub async fn run_diagnostic(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, TelemetryError> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| TelemetryError::CommandTimeout {
            program: program.to_string(),
            timeout,
        })?
        .map_err(|e| TelemetryError::CommandFailed {
            program: program.to_string(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(TelemetryError::CommandFailed {
            program: program.to_string(),
            detail: format!("exited with {}", output.status),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Captures a `<number> <mW|W>` pair and normalises it to watts.
fn capture_watts(re: &Regex, text: &str) -> Option<f64> {
    let caps = re.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(unit) if unit == "mw" => Some(value / 1000.0),
        _ => Some(value),
    }
}

fn parse_powermetrics(text: &str) -> Result<ProbeReading, TelemetryError> {
    let reading = ProbeReading {
        gpu_percent: capture_f64(&GPU_RESIDENCY_RE, text),
        gpu_temp: capture_f64(&GPU_TEMP_RE, text),
        gpu_power_w: capture_watts(&GPU_POWER_RE, text),
        cpu_power_w: capture_watts(&CPU_POWER_RE, text),
        cpu_temp: capture_f64(&CPU_TEMP_RE, text),
    };
    non_empty(reading, "powermetrics")
}

fn parse_ioreg(text: &str) -> Result<ProbeReading, TelemetryError> {
    let reading = ProbeReading {
        gpu_percent: capture_f64(&DEVICE_UTILISATION_RE, text),
        ..Default::default()
    };
    non_empty(reading, "ioreg")
}

/// Parses `utilization.gpu, temperature.gpu, power.draw` CSV (first GPU).
/// Unsupported columns read as `[N/A]` or `[Not Supported]`.
fn parse_nvidia_smi(text: &str) -> Result<ProbeReading, TelemetryError> {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut fields = line.split(',').map(|f| f.trim().parse::<f64>().ok());
    let reading = ProbeReading {
        gpu_percent: fields.next().flatten(),
        gpu_temp: fields.next().flatten(),
        gpu_power_w: fields.next().flatten(),
        ..Default::default()
    };
    non_empty(reading, "nvidia-smi")
}

/// Reads the first DRM card exposing `gpu_busy_percent` (amdgpu, some i915).
fn read_drm(base: &Path) -> Result<ProbeReading, TelemetryError> {
    let mut cards: Vec<PathBuf> = std::fs::read_dir(base)
        .map_err(|e| TelemetryError::ReadError {
            path: base.display().to_string(),
            source: e,
        })?
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.len() > 4
                && name.starts_with("card")
                && name[4..].chars().all(|c| c.is_ascii_digit())
        })
        .map(|e| e.path().join("device"))
        .collect();
    cards.sort();

    for dev in cards {
        let Ok(busy) = read_sysfs_file(&dev.join("gpu_busy_percent")) else {
            continue;
        };
        let mut reading = ProbeReading {
            gpu_percent: busy.parse().ok(),
            ..Default::default()
        };
        if let Some(hwmon) = first_hwmon(&dev) {
            reading.gpu_temp = read_scaled(&hwmon.join("temp1_input"), 1000.0);
            reading.gpu_power_w = read_scaled(&hwmon.join("power1_average"), 1_000_000.0);
        }
        return non_empty(reading, "drm-sysfs");
    }

    Err(TelemetryError::NotAvailable {
        path: base.join("card*/device/gpu_busy_percent").display().to_string(),
    })
}

fn first_hwmon(device: &Path) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(device.join("hwmon"))
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs.into_iter().next()
}

fn read_scaled(path: &Path, divisor: f64) -> Option<f64> {
    read_sysfs_file(path)
        .ok()?
        .parse::<f64>()
        .ok()
        .map(|v| v / divisor)
}

fn non_empty(reading: ProbeReading, source: &str) -> Result<ProbeReading, TelemetryError> {
    if reading.is_empty() {
        Err(TelemetryError::ParseError {
            path: source.to_string(),
            detail: "no recognised values in output".to_string(),
        })
    } else {
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POWERMETRICS_SAMPLE: &str = "\
**** Processor usage ****

CPU Power: 3521 mW
GPU Power: 812 mW
Combined Power (CPU + GPU + ANE): 4333 mW

**** GPU usage ****

GPU HW active frequency: 1278 MHz
GPU HW active residency:  42.17% (389 MHz:   0% 486 MHz:  12%)
GPU idle residency:  57.83%

**** SMC sensors ****

CPU die temperature: 51.23 C
GPU die temperature: 47.80 C
";

    #[test]
    fn test_parse_powermetrics() {
        let r = parse_powermetrics(POWERMETRICS_SAMPLE).unwrap();
        assert_eq!(r.gpu_percent, Some(42.17));
        assert_eq!(r.gpu_temp, Some(47.80));
        assert_eq!(r.cpu_temp, Some(51.23));
        assert!((r.gpu_power_w.unwrap() - 0.812).abs() < 1e-9);
        assert!((r.cpu_power_w.unwrap() - 3.521).abs() < 1e-9);
    }

    #[test]
    fn test_parse_powermetrics_watts_and_old_label() {
        let text = "GPU Active residency: 5.5%\nGPU Power: 1.25 W\n";
        let r = parse_powermetrics(text).unwrap();
        assert_eq!(r.gpu_percent, Some(5.5));
        assert_eq!(r.gpu_power_w, Some(1.25));
        assert_eq!(r.gpu_temp, None);
    }

    #[test]
    fn test_parse_powermetrics_garbage() {
        assert!(parse_powermetrics("sudo: a password is required\n").is_err());
    }

    #[test]
    fn test_patterns_compile() {
        for re in [
            &*GPU_RESIDENCY_RE,
            &*GPU_TEMP_RE,
            &*CPU_TEMP_RE,
            &*GPU_POWER_RE,
            &*CPU_POWER_RE,
            &*DEVICE_UTILISATION_RE,
        ] {
            assert!(re.captures_len() >= 2);
        }
    }

    #[test]
    fn test_parse_ioreg() {
        let text = r#"  | "PerformanceStatistics" = {"In use system memory"=123456,"Device Utilization %"=37,"Renderer Utilization %"=35}"#;
        let r = parse_ioreg(text).unwrap();
        assert_eq!(r.gpu_percent, Some(37.0));
        assert_eq!(r.gpu_power_w, None);
    }

    #[test]
    fn test_parse_nvidia_smi() {
        let r = parse_nvidia_smi("87, 71, 243.52\n").unwrap();
        assert_eq!(r.gpu_percent, Some(87.0));
        assert_eq!(r.gpu_temp, Some(71.0));
        assert_eq!(r.gpu_power_w, Some(243.52));
    }

    #[test]
    fn test_parse_nvidia_smi_not_supported_power() {
        let r = parse_nvidia_smi("3, 40, [N/A]\n12, 44, 30.1\n").unwrap();
        assert_eq!(r.gpu_percent, Some(3.0));
        assert_eq!(r.gpu_power_w, None);
    }

    #[test]
    fn test_parse_nvidia_smi_empty() {
        assert!(parse_nvidia_smi("").is_err());
    }

    #[test]
    fn test_read_drm_sysfs() {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("card0").join("device");
        let hwmon = dev.join("hwmon").join("hwmon3");
        std::fs::create_dir_all(&hwmon).unwrap();
        std::fs::create_dir_all(dir.path().join("card0-DP-1")).unwrap();
        std::fs::write(dev.join("gpu_busy_percent"), "64\n").unwrap();
        std::fs::write(hwmon.join("temp1_input"), "58000\n").unwrap();
        std::fs::write(hwmon.join("power1_average"), "35000000\n").unwrap();

        let r = read_drm(dir.path()).unwrap();
        assert_eq!(r.gpu_percent, Some(64.0));
        assert_eq!(r.gpu_temp, Some(58.0));
        assert_eq!(r.gpu_power_w, Some(35.0));
    }

    #[test]
    fn test_read_drm_without_busy_counter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("card0").join("device")).unwrap();
        assert!(matches!(read_drm(dir.path()), Err(TelemetryError::NotAvailable { .. })));
    }

    #[test]
    fn test_chains() {
        assert_eq!(ProbeKind::chain(Platform::Macos)[0], ProbeKind::Powermetrics);
        assert_eq!(ProbeKind::chain(Platform::Linux).len(), 2);
        assert_eq!(ProbeKind::chain(Platform::Windows), &[ProbeKind::NvidiaSmi]);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let result = run_diagnostic(
            "chronosbench-definitely-not-installed",
            &[],
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(TelemetryError::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_diagnostic_timeout() {
        let result = run_diagnostic("sleep", &["5"], Duration::from_millis(100)).await;
        assert!(matches!(result, Err(TelemetryError::CommandTimeout { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_diagnostic_captures_stdout() {
        let out = run_diagnostic("echo", &["GPU Power: 2 W"], Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(parse_powermetrics(&out).unwrap().gpu_power_w, Some(2.0));
    }
}

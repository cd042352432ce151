// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Report persistence.
//!
//! Each report is written twice under the reports directory:
//! `chronosbenchx_<YYYY-MM-DD_HH-MM-SS>.json` holds the pretty-printed
//! report, and the `.txt` sibling holds a title line followed by the same
//! JSON. The stamp is the report timestamp in local time.

use crate::{ReportSink, SessionError};
use chrono::Local;
use scoring::Report;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "chronosbenchx_";
const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Where a report was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub text: PathBuf,
}

/// Writes reports as JSON and text files.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    last: Option<ReportPaths>,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of the most recent successful write.
    pub fn last_written(&self) -> Option<&ReportPaths> {
        self.last.as_ref()
    }

    /// File name without extension for `report`.
    pub fn file_stem(report: &Report) -> String {
        let local = report.meta().timestamp.with_timezone(&Local);
        format!("{FILE_PREFIX}{}", local.format(STAMP_FORMAT))
    }

    /// Text form: title line, then the pretty JSON.
    pub fn render_text(report: &Report) -> Result<String, SessionError> {
        Ok(format!(
            "ChronosBench X v{} Report\n{}",
            report.meta().tool_version,
            report.to_pretty_json()?
        ))
    }

    /// Creates the directory if needed and writes both files.
    pub fn write(&self, report: &Report) -> Result<ReportPaths, SessionError> {
        fs::create_dir_all(&self.dir).map_err(|source| SessionError::PersistError {
            path: self.dir.display().to_string(),
            source,
        })?;

        let stem = Self::file_stem(report);
        let paths = ReportPaths {
            json: self.dir.join(format!("{stem}.json")),
            text: self.dir.join(format!("{stem}.txt")),
        };
        write_file(&paths.json, &report.to_pretty_json()?)?;
        write_file(&paths.text, &Self::render_text(report)?)?;
        Ok(paths)
    }
}

impl ReportSink for ReportWriter {
    fn deliver(&mut self, report: &Report) -> Result<(), SessionError> {
        let paths = self.write(report)?;
        tracing::info!(
            json = %paths.json.display(),
            text = %paths.text.display(),
            "Report saved"
        );
        self.last = Some(paths);
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), SessionError> {
    fs::write(path, contents).map_err(|source| SessionError::PersistError {
        path: path.display().to_string(),
        source,
    })
}

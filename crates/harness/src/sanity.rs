// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Post-sweep sanity checks over a metrics log.
//!
//! Works on raw CSV records rather than [`crate::io::MetricsRow`] so that
//! malformed values are reported instead of aborting the read.

use crate::io::METRICS_COLUMNS;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use vidstore_bench_core::Result;

/// Columns that must parse as numbers when present.
pub const NUMERIC_COLUMNS: [&str; 4] = [
    "original_text_bytes",
    "total_artifact_bytes",
    "encode_seconds",
    "decode_full_seconds",
];

/// Columns that must hold `true` or `false`.
pub const BOOLEAN_COLUMNS: [&str; 1] = ["accuracy_passed"];

/// Columns that must not be empty on rows without an error.
pub const KEY_METRIC_COLUMNS: [&str; 3] =
    ["original_text_bytes", "total_artifact_bytes", "encode_seconds"];

/// Error rows reproduced in the report.
pub const ERROR_SAMPLE_LIMIT: usize = 5;

/// A row that carried an error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSample {
    /// Benchmarked document.
    pub filename: String,
    /// Codec of the run.
    pub codec: String,
    /// Engine mode flag as written.
    pub engine_mode: String,
    /// The error message.
    pub error: String,
}

/// Findings of [`check_log`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanityReport {
    /// Checked log.
    pub path: PathBuf,
    /// Data rows read.
    pub row_count: usize,
    /// Expected columns absent from the header.
    pub missing_columns: Vec<String>,
    /// Values of the wrong type, one line per column.
    pub type_issues: Vec<String>,
    /// Empty key metrics on rows that report no error.
    pub missing_values: Vec<String>,
    /// Rows with a non-empty error message.
    pub error_rows: usize,
    /// The first error rows.
    pub error_samples: Vec<ErrorSample>,
}

impl SanityReport {
    /// No structural or type problem was found. Error rows alone do not
    /// fail the check.
    pub fn passed(&self) -> bool {
        self.row_count > 0
            && self.missing_columns.is_empty()
            && self.type_issues.is_empty()
            && self.missing_values.is_empty()
    }
}

impl fmt::Display for SanityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sanity check of {}", self.path.display())?;
        writeln!(f, "  rows: {}", self.row_count)?;
        if self.row_count == 0 {
            writeln!(f, "  WARNING: the log has no data rows")?;
        }

        if self.missing_columns.is_empty() {
            writeln!(f, "  columns: all {} present", METRICS_COLUMNS.len())?;
        } else {
            writeln!(f, "  ERROR: missing columns: {}", self.missing_columns.join(", "))?;
        }
        for issue in &self.type_issues {
            writeln!(f, "  ERROR: {}", issue)?;
        }
        for warning in &self.missing_values {
            writeln!(f, "  WARNING: {}", warning)?;
        }

        if self.error_rows == 0 {
            writeln!(f, "  errors: none")?;
        } else {
            writeln!(f, "  errors: {} row(s) reported an error", self.error_rows)?;
            for sample in &self.error_samples {
                writeln!(
                    f,
                    "    - {} ({}, mode {}): {}",
                    sample.filename, sample.codec, sample.engine_mode, sample.error
                )?;
            }
            if self.error_rows > self.error_samples.len() {
                writeln!(
                    f,
                    "    ... and {} more",
                    self.error_rows - self.error_samples.len()
                )?;
            }
        }
        write!(f, "  result: {}", if self.passed() { "OK" } else { "ISSUES FOUND" })
    }
}

/// Run the sanity checks over the log at `path`.
pub fn check_log(path: impl AsRef<Path>) -> Result<SanityReport> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect();

    let mut report = SanityReport {
        path: path.to_path_buf(),
        missing_columns: METRICS_COLUMNS
            .iter()
            .filter(|c| !headers.contains_key(**c))
            .map(|c| c.to_string())
            .collect(),
        ..SanityReport::default()
    };

    let mut non_numeric: HashMap<&str, usize> = HashMap::new();
    let mut non_boolean: HashMap<&str, usize> = HashMap::new();
    let mut missing: HashMap<&str, usize> = HashMap::new();

    for record in reader.records() {
        let record = record?;
        report.row_count += 1;
        let field = |name: &str| -> &str {
            headers
                .get(name)
                .and_then(|&i| record.get(i))
                .map(str::trim)
                .unwrap_or("")
        };

        for column in NUMERIC_COLUMNS {
            let value = field(column);
            if !value.is_empty() && value.parse::<f64>().is_err() {
                *non_numeric.entry(column).or_default() += 1;
            }
        }
        for column in BOOLEAN_COLUMNS {
            let value = field(column);
            if !value.is_empty()
                && !value.eq_ignore_ascii_case("true")
                && !value.eq_ignore_ascii_case("false")
            {
                *non_boolean.entry(column).or_default() += 1;
            }
        }

        let error = field("error_message");
        if error.is_empty() {
            for column in KEY_METRIC_COLUMNS {
                if headers.contains_key(column) && field(column).is_empty() {
                    *missing.entry(column).or_default() += 1;
                }
            }
        } else {
            report.error_rows += 1;
            if report.error_samples.len() < ERROR_SAMPLE_LIMIT {
                report.error_samples.push(ErrorSample {
                    filename: field("original_filename").to_string(),
                    codec: field("encoder_codec").to_string(),
                    engine_mode: field("engine_mode_flag").to_string(),
                    error: error.to_string(),
                });
            }
        }
    }

    for column in NUMERIC_COLUMNS {
        if let Some(n) = non_numeric.get(column) {
            report
                .type_issues
                .push(format!("column '{}' has {} non-numeric value(s)", column, n));
        }
    }
    for column in BOOLEAN_COLUMNS {
        if let Some(n) = non_boolean.get(column) {
            report
                .type_issues
                .push(format!("column '{}' has {} non-boolean value(s)", column, n));
        }
    }
    for column in KEY_METRIC_COLUMNS {
        if let Some(n) = missing.get(column) {
            report.missing_values.push(format!(
                "column '{}' is empty on {} row(s) without an error message",
                column, n
            ));
        }
    }

    Ok(report)
}

// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persistence of benchmark metrics.
//!
//! The CSV metrics log is append-only: one header, then one row per run,
//! accumulated across invocations. JSON and markdown outputs are written
//! whole.

use crate::markdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vidstore_bench_core::{ChunkCount, Error, MetricsRecord, Result};

/// Columns of the metrics log, in order. `error_message` is always last.
pub const METRICS_COLUMNS: [&str; 19] = [
    "original_filename",
    "timestamp",
    "encoder_codec",
    "engine_mode_flag",
    "original_text_bytes",
    "gzipped_text_bytes",
    "decoded_text_bytes",
    "artifact_primary_bytes",
    "artifact_index_bytes",
    "total_artifact_bytes",
    "original_text_digest",
    "decoded_text_digest",
    "accuracy_passed",
    "encode_seconds",
    "decode_full_seconds",
    "decode_avg_sample_seconds",
    "chunk_count",
    "verification_outcome",
    "error_message",
];

/// One flattened row of the metrics log.
///
/// Reading tolerates logs written by other tools: unknown columns are
/// ignored and absent ones take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsRow {
    /// Benchmarked document.
    pub original_filename: String,
    /// Run start, RFC 3339.
    pub timestamp: DateTime<Utc>,
    /// Codec name.
    pub encoder_codec: String,
    /// Alternate backend requested.
    pub engine_mode_flag: bool,
    /// Trimmed input size.
    pub original_text_bytes: u64,
    /// Gzipped trimmed input size.
    pub gzipped_text_bytes: u64,
    /// Trimmed decoded size.
    pub decoded_text_bytes: u64,
    /// Primary artifact size.
    pub artifact_primary_bytes: u64,
    /// Index artifact size.
    pub artifact_index_bytes: u64,
    /// Sum of both artifact sizes.
    pub total_artifact_bytes: u64,
    /// SHA-256 of the trimmed input.
    pub original_text_digest: String,
    /// SHA-256 of the trimmed decoded text.
    pub decoded_text_digest: String,
    /// Digests matched.
    pub accuracy_passed: bool,
    /// Encode wall-clock seconds.
    pub encode_seconds: f64,
    /// Full decode wall-clock seconds.
    pub decode_full_seconds: f64,
    /// Mean sampled decode seconds; empty when no sample succeeded.
    pub decode_avg_sample_seconds: Option<f64>,
    /// Chunk count or `unknown`.
    pub chunk_count: ChunkCount,
    /// Verification outcome name.
    pub verification_outcome: String,
    /// Rendered diagnostics; empty for a clean run.
    pub error_message: Option<String>,
}

impl From<&MetricsRecord> for MetricsRow {
    fn from(record: &MetricsRecord) -> Self {
        Self {
            original_filename: record.original_filename.clone(),
            timestamp: record.timestamp,
            encoder_codec: record.encoder_codec.to_string(),
            engine_mode_flag: record.engine_mode_flag,
            original_text_bytes: record.original_text_bytes,
            gzipped_text_bytes: record.gzipped_text_bytes,
            decoded_text_bytes: record.decoded_text_bytes,
            artifact_primary_bytes: record.artifact_primary_bytes,
            artifact_index_bytes: record.artifact_index_bytes,
            total_artifact_bytes: record.total_artifact_bytes(),
            original_text_digest: record.original_text_digest.clone(),
            decoded_text_digest: record.decoded_text_digest.clone(),
            accuracy_passed: record.accuracy_passed(),
            encode_seconds: record.encode_seconds,
            decode_full_seconds: record.decode_full_seconds,
            decode_avg_sample_seconds: record.decode_avg_sample_seconds,
            chunk_count: record.chunk_count,
            verification_outcome: record.verification.to_string(),
            error_message: record.error_message(),
        }
    }
}

impl MetricsRow {
    /// Whether the run recorded any diagnostic.
    pub fn has_error(&self) -> bool {
        self.error_message
            .as_deref()
            .map(|msg| !msg.trim().is_empty())
            .unwrap_or(false)
    }

    /// Artifact size relative to the gzipped input.
    pub fn storage_ratio_vs_gzip(&self) -> Option<f64> {
        (self.total_artifact_bytes > 0 && self.gzipped_text_bytes > 0)
            .then(|| self.total_artifact_bytes as f64 / self.gzipped_text_bytes as f64)
    }
}

/// Convert records into log rows.
pub fn rows_from_records(records: &[MetricsRecord]) -> Vec<MetricsRow> {
    records.iter().map(MetricsRow::from).collect()
}

/// Append-only CSV metrics log.
#[derive(Debug, Clone)]
pub struct MetricsLog {
    path: PathBuf,
}

impl MetricsLog {
    /// Log at `path`; nothing is touched until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row per record, writing the header first when the file is
    /// new or empty. Each row goes out in a single write so that a failure
    /// never leaves a partial row behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] when the file or its directory cannot
    /// be created or written.
    pub fn append(&self, records: &[MetricsRecord]) -> Result<()> {
        if records.is_empty() {
            debug!(path = %self.path.display(), "No records to append");
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::persistence(&self.path, e))?;
        let is_new = file
            .metadata()
            .map_err(|e| Error::persistence(&self.path, e))?
            .len()
            == 0;

        if is_new {
            let header = encode_line(|w| w.write_record(METRICS_COLUMNS))?;
            file.write_all(&header)
                .map_err(|e| Error::persistence(&self.path, e))?;
        }
        for record in records {
            let row = encode_line(|w| w.serialize(MetricsRow::from(record)))?;
            file.write_all(&row)
                .map_err(|e| Error::persistence(&self.path, e))?;
        }
        file.flush().map_err(|e| Error::persistence(&self.path, e))?;

        info!(
            path = %self.path.display(),
            rows = records.len(),
            header_written = is_new,
            "Metrics appended"
        );
        Ok(())
    }

    /// Read every row back.
    pub fn read_rows(&self) -> Result<Vec<MetricsRow>> {
        read_rows(&self.path)
    }
}

fn encode_line<F>(write: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut csv::Writer<Vec<u8>>) -> csv::Result<()>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    write(&mut writer)?;
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}

/// Read a metrics log written by [`MetricsLog::append`] or a compatible tool.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<MetricsRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path.as_ref())?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Write records as a pretty-printed JSON array.
pub fn write_records_json(records: &[MetricsRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).map_err(|e| Error::persistence(path, e))
}

/// Read records written by [`write_records_json`].
pub fn read_records_json(path: impl AsRef<Path>) -> Result<Vec<MetricsRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write the markdown summary of `rows`.
pub fn write_summary(rows: &[MetricsRow], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, markdown::generate_summary(rows)).map_err(|e| Error::persistence(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidstore_bench_core::{Codec, FailureKind, Stage, VerificationOutcome};

    fn clean_record(name: &str) -> MetricsRecord {
        let mut record = MetricsRecord::new(name, Codec::H265, true);
        record.original_text_bytes = 500;
        record.gzipped_text_bytes = 120;
        record.decoded_text_bytes = 500;
        record.artifact_primary_bytes = 4096;
        record.artifact_index_bytes = 1024;
        record.original_text_digest = "ab".repeat(32);
        record.decoded_text_digest = "ab".repeat(32);
        record.encode_seconds = 0.5;
        record.decode_full_seconds = 0.25;
        record.decode_avg_sample_seconds = Some(0.01);
        record.chunk_count = ChunkCount::Known(2);
        record.verification = VerificationOutcome::Passed;
        record
    }

    #[test]
    fn test_header_matches_row_fields() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(MetricsRow::default()).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, METRICS_COLUMNS.join(","));
        assert_eq!(METRICS_COLUMNS.last(), Some(&"error_message"));
    }

    #[test]
    fn test_append_writes_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = MetricsLog::new(dir.path().join("nested/results/benchmarks.csv"));

        log.append(&[clean_record("a.txt"), clean_record("b.txt")]).unwrap();
        log.append(&[clean_record("c.txt")]).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert_eq!(content.matches("original_filename").count(), 1);

        let rows = log.read_rows().unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.original_filename.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_row_values() {
        let dir = tempfile::tempdir().unwrap();
        let log = MetricsLog::new(dir.path().join("log.csv"));
        let clean = clean_record("clean.txt");
        let mut failed = MetricsRecord::new("broken, \"quoted\".txt", Codec::Mp4v, false);
        failed.push_diagnostic(Stage::Encode, FailureKind::EncodingError, "codec missing");
        log.append(&[clean.clone(), failed]).unwrap();

        let rows = log.read_rows().unwrap();
        assert_eq!(rows[0].encoder_codec, "h265");
        assert!(rows[0].engine_mode_flag);
        assert_eq!(rows[0].total_artifact_bytes, 5120);
        assert!(rows[0].accuracy_passed);
        assert_eq!(rows[0].chunk_count, ChunkCount::Known(2));
        assert_eq!(rows[0].verification_outcome, "passed");
        assert_eq!(rows[0].error_message, None);
        assert_eq!(rows[0].timestamp, clean.timestamp);

        assert_eq!(rows[1].original_filename, "broken, \"quoted\".txt");
        assert_eq!(rows[1].chunk_count, ChunkCount::Unknown);
        assert_eq!(rows[1].decode_avg_sample_seconds, None);
        assert!(!rows[1].accuracy_passed);
        assert_eq!(
            rows[1].error_message.as_deref(),
            Some("EncodingError [encode]: codec missing")
        );
        assert!(rows[1].has_error());
    }

    #[test]
    fn test_empty_existing_file_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, "").unwrap();
        MetricsLog::new(&path).append(&[clean_record("a.txt")]).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("original_filename,"));
    }

    #[test]
    fn test_append_nothing_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = MetricsLog::new(dir.path().join("log.csv"));
        log.append(&[]).unwrap();
        assert!(!log.path().exists());
    }

    #[test]
    fn test_unwritable_destination_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "file").unwrap();
        let log = MetricsLog::new(blocker.join("log.csv"));

        let err = log.append(&[clean_record("a.txt")]).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(err.to_string().starts_with("PersistenceError"));
    }

    #[test]
    fn test_reads_logs_with_extra_and_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.csv");
        fs::write(
            &path,
            "original_filename,encoder_codec,original_text_bytes,notes\n\
             legacy.txt,mp4v,42,hand edited\n",
        )
        .unwrap();
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].original_filename, "legacy.txt");
        assert_eq!(rows[0].original_text_bytes, 42);
        assert_eq!(rows[0].chunk_count, ChunkCount::Unknown);
        assert!(!rows[0].has_error());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let records = vec![clean_record("a.txt")];
        write_records_json(&records, &path).unwrap();
        assert_eq!(read_records_json(&path).unwrap(), records);
    }
}

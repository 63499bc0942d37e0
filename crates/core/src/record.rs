// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! The per-run metrics record and its diagnostic entries.
//!
//! A [`MetricsRecord`] is created with safe defaults when a run starts, is
//! filled in by the benchmark runner stage by stage, and is handed out by
//! value when the run ends. Writers only ever borrow records immutably.
//!
//! Two fields of the persisted schema are derived rather than stored so they
//! cannot drift from their inputs:
//!
//! ```text
//! total_artifact_bytes = artifact_primary_bytes + artifact_index_bytes
//! accuracy_passed      = verification == Passed
//! ```

use crate::codec::Codec;
use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Literal persisted when the chunk count could not be resolved.
pub const UNKNOWN_CHUNK_COUNT: &str = "unknown";

/// Number of chunks an encoded artifact holds.
///
/// Persisted as a plain integer, or as the literal `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkCount {
    /// Count resolved from the index or the engine's statistics.
    Known(u64),
    /// No source yielded a non-negative integer.
    #[default]
    Unknown,
}

impl ChunkCount {
    /// The resolved count, if any.
    pub fn known(&self) -> Option<u64> {
        match self {
            ChunkCount::Known(n) => Some(*n),
            ChunkCount::Unknown => None,
        }
    }
}

impl fmt::Display for ChunkCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkCount::Known(n) => write!(f, "{}", n),
            ChunkCount::Unknown => f.write_str(UNKNOWN_CHUNK_COUNT),
        }
    }
}

impl Serialize for ChunkCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChunkCount::Known(n) => serializer.serialize_u64(*n),
            ChunkCount::Unknown => serializer.serialize_str(UNKNOWN_CHUNK_COUNT),
        }
    }
}

struct ChunkCountVisitor;

impl<'de> Visitor<'de> for ChunkCountVisitor {
    type Value = ChunkCount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or \"unknown\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ChunkCount, E> {
        Ok(ChunkCount::Known(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ChunkCount, E> {
        Ok(u64::try_from(v).map_or(ChunkCount::Unknown, ChunkCount::Known))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<ChunkCount, E> {
        Ok(ChunkCount::Unknown)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ChunkCount, E> {
        let v = v.trim();
        if v.is_empty() || v.eq_ignore_ascii_case(UNKNOWN_CHUNK_COUNT) {
            return Ok(ChunkCount::Unknown);
        }
        Ok(v.parse::<u64>().map_or(ChunkCount::Unknown, ChunkCount::Known))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ChunkCount, E> {
        Ok(ChunkCount::Unknown)
    }

    fn visit_none<E: de::Error>(self) -> Result<ChunkCount, E> {
        Ok(ChunkCount::Unknown)
    }
}

impl<'de> Deserialize<'de> for ChunkCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ChunkCountVisitor)
    }
}

/// Pipeline stage a diagnostic is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Text extraction from the source document.
    Extract,
    /// Size and digest of the extracted text.
    Baseline,
    /// Engine encode call.
    Encode,
    /// Stat of the produced artifacts.
    MeasureArtifacts,
    /// Decode of every chunk.
    DecodeFull,
    /// Digest comparison.
    Verify,
    /// Timed single-chunk decodes.
    SampleDecode,
    /// The run as a whole (failures outside any single stage).
    Run,
}

impl Stage {
    /// Snake-case name, as used in rendered diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Baseline => "baseline",
            Stage::Encode => "encode",
            Stage::MeasureArtifacts => "measure_artifacts",
            Stage::DecodeFull => "decode_full",
            Stage::Verify => "verify",
            Stage::SampleDecode => "sample_decode",
            Stage::Run => "run",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// No usable text could be extracted.
    ExtractionFailure,
    /// The engine failed to encode, or its declared output is missing.
    EncodingError,
    /// The engine failed to decode, the chunk count is unresolvable, or the
    /// decoded text disagrees with what the engine stored.
    DecodingError,
    /// The metrics log could not be written.
    PersistenceError,
    /// Anything else, including panics inside collaborators.
    UnexpectedError,
    /// Input and decoded digests differ for a reason the run could attribute
    /// to the encoder itself. Not fatal.
    VerificationMismatch,
}

impl FailureKind {
    /// Name as it appears in `error_message`.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ExtractionFailure => "ExtractionFailure",
            FailureKind::EncodingError => "EncodingError",
            FailureKind::DecodingError => "DecodingError",
            FailureKind::PersistenceError => "PersistenceError",
            FailureKind::UnexpectedError => "UnexpectedError",
            FailureKind::VerificationMismatch => "VerificationMismatch",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attributed entry in a record's diagnostics list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stage that produced it.
    pub stage: Stage,
    /// What went wrong.
    pub kind: FailureKind,
    /// Free-text detail.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.kind, self.stage, self.message)
    }
}

/// Result of comparing the input digest with the decoded digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The run stopped before verification.
    #[default]
    Skipped,
    /// Digests are identical.
    Passed,
    /// Decoded text matches the text the engine stored, which itself differs
    /// from the input: the encoder re-chunked or normalized the input.
    Transformed,
    /// Decoded text differs from the text the engine stored.
    Corrupted,
    /// Digests differ and the index carries no stored text to compare with.
    Unexplained,
}

impl VerificationOutcome {
    /// Snake-case name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationOutcome::Skipped => "skipped",
            VerificationOutcome::Passed => "passed",
            VerificationOutcome::Transformed => "transformed",
            VerificationOutcome::Corrupted => "corrupted",
            VerificationOutcome::Unexplained => "unexplained",
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics gathered by one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Name of the benchmarked document.
    pub original_filename: String,
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Codec requested from the engine.
    pub encoder_codec: Codec,
    /// Whether the engine's alternate backend was requested.
    pub engine_mode_flag: bool,
    /// UTF-8 size of the trimmed input text.
    pub original_text_bytes: u64,
    /// Gzipped size of the trimmed input text.
    pub gzipped_text_bytes: u64,
    /// UTF-8 size of the trimmed decoded text.
    pub decoded_text_bytes: u64,
    /// Size of the primary artifact.
    pub artifact_primary_bytes: u64,
    /// Size of the index artifact.
    pub artifact_index_bytes: u64,
    /// SHA-256 of the trimmed input text.
    pub original_text_digest: String,
    /// SHA-256 of the trimmed decoded text.
    pub decoded_text_digest: String,
    /// Wall-clock time of the encode call.
    pub encode_seconds: f64,
    /// Wall-clock time of the full decode.
    pub decode_full_seconds: f64,
    /// Mean time of the successful sampled chunk decodes.
    pub decode_avg_sample_seconds: Option<f64>,
    /// Resolved chunk count.
    pub chunk_count: ChunkCount,
    /// How verification ended.
    pub verification: VerificationOutcome,
    /// Ordered diagnostics; empty for a clean run.
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl MetricsRecord {
    /// Create a record with every metric at its safe default.
    pub fn new(filename: impl Into<String>, codec: Codec, alternate_backend: bool) -> Self {
        Self {
            original_filename: filename.into(),
            timestamp: Utc::now(),
            encoder_codec: codec,
            engine_mode_flag: alternate_backend,
            original_text_bytes: 0,
            gzipped_text_bytes: 0,
            decoded_text_bytes: 0,
            artifact_primary_bytes: 0,
            artifact_index_bytes: 0,
            original_text_digest: String::new(),
            decoded_text_digest: String::new(),
            encode_seconds: 0.0,
            decode_full_seconds: 0.0,
            decode_avg_sample_seconds: None,
            chunk_count: ChunkCount::Unknown,
            verification: VerificationOutcome::Skipped,
            diagnostics: Vec::new(),
        }
    }

    /// Minimal record for a run that failed as a whole.
    pub fn failed_run(
        filename: impl Into<String>,
        codec: Codec,
        alternate_backend: bool,
        message: impl Into<String>,
    ) -> Self {
        let mut record = Self::new(filename, codec, alternate_backend);
        record.push_diagnostic(Stage::Run, FailureKind::UnexpectedError, message);
        record
    }

    /// Append a diagnostic.
    pub fn push_diagnostic(&mut self, stage: Stage, kind: FailureKind, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(stage, kind, message));
    }

    /// Sum of both artifact sizes.
    pub fn total_artifact_bytes(&self) -> u64 {
        self.artifact_primary_bytes + self.artifact_index_bytes
    }

    /// Whether the decoded text reproduced the input exactly.
    pub fn accuracy_passed(&self) -> bool {
        self.verification == VerificationOutcome::Passed
    }

    /// Diagnostics rendered for the persisted `error_message` column.
    pub fn error_message(&self) -> Option<String> {
        if self.diagnostics.is_empty() {
            return None;
        }
        Some(
            self.diagnostics
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Whether any diagnostic of `kind` was recorded.
    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }

    /// Whether the run finished without any diagnostic.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Primary plus index size relative to the gzipped input, when both are
    /// non-zero.
    pub fn storage_ratio_vs_gzip(&self) -> Option<f64> {
        let total = self.total_artifact_bytes();
        (total > 0 && self.gzipped_text_bytes > 0)
            .then(|| total as f64 / self.gzipped_text_bytes as f64)
    }
}

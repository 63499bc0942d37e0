// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-document benchmark runner.
//!
//! A run walks seven stages in order: extract, baseline, encode, measure
//! artifacts, full decode, verify, sampled decode. Each stage returns
//! `Result<(), Diagnostic>`; the first fatal failure stops the run and is
//! attached to the record, which is returned in every case. Panics raised
//! by collaborators are caught and recorded as unexpected errors.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;
use vidstore_bench_core::digest;
use vidstore_bench_core::{
    ChunkDecoder, Codec, Diagnostic, EncodeRequest, EncodedArtifacts, Engine, EngineConfig,
    EngineError, FailureKind, MetricsRecord, Stage, TextExtractor, TextSource,
    VerificationOutcome,
};

use crate::resolver::{self, IndexSummary};
use crate::sampler::{select_sample_ids, time_sampled_chunks};

const DIGEST_PREFIX_CHARS: usize = 12;

/// Inputs of one benchmark run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Document to benchmark.
    pub source: TextSource,
    /// Name recorded as `original_filename`.
    pub filename: String,
    /// Codec to request.
    pub codec: Codec,
    /// Whether to request the engine's alternate backend.
    pub alternate_backend: bool,
    /// Options passed to the encoder.
    pub encoder_config: Option<EngineConfig>,
    /// Options passed when opening the decoder.
    pub decoder_config: Option<EngineConfig>,
}

impl RunRequest {
    /// Request for `source`, recorded under `filename`.
    pub fn new(
        source: TextSource,
        filename: impl Into<String>,
        codec: Codec,
        alternate_backend: bool,
    ) -> Self {
        Self {
            source,
            filename: filename.into(),
            codec,
            alternate_backend,
            encoder_config: None,
            decoder_config: None,
        }
    }

    /// Request for a file on disk, recorded under its file name.
    pub fn for_path(path: impl Into<PathBuf>, codec: Codec, alternate_backend: bool) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(TextSource::Path(path), filename, codec, alternate_backend)
    }

    /// Set the encoder options.
    pub fn with_encoder_config(mut self, config: EngineConfig) -> Self {
        self.encoder_config = Some(config);
        self
    }

    /// Set the decoder options.
    pub fn with_decoder_config(mut self, config: EngineConfig) -> Self {
        self.decoder_config = Some(config);
        self
    }

    /// Stem of the artifact file names:
    /// `<document stem>_<extension>_<codec>_<mode>`.
    ///
    /// Distinct per document, codec and mode, so a sweep never overwrites
    /// the artifacts of another combination.
    pub fn output_stem(&self) -> String {
        let path = Path::new(&self.filename);
        let stem = sanitize(path.file_stem());
        let stem = if stem.is_empty() { "document".to_string() } else { stem };
        let mode = if self.alternate_backend { "alt" } else { "native" };
        match sanitize(path.extension()) {
            ext if ext.is_empty() => format!("{}_{}_{}", stem, self.codec, mode),
            ext => format!("{}_{}_{}_{}", stem, ext.to_ascii_lowercase(), self.codec, mode),
        }
    }
}

fn sanitize(part: Option<&std::ffi::OsStr>) -> String {
    part.map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Anything that turns a [`RunRequest`] into a [`MetricsRecord`].
///
/// Implementations must always return a record; failures are described by
/// its diagnostics.
pub trait Benchmark {
    /// Execute one run.
    fn run(&self, request: RunRequest) -> MetricsRecord;
}

/// Benchmarks an engine on documents read by an extractor.
pub struct BenchmarkRunner {
    extractor: Box<dyn TextExtractor>,
    engine: Box<dyn Engine>,
}

impl BenchmarkRunner {
    /// Runner over the given collaborators.
    pub fn new(extractor: Box<dyn TextExtractor>, engine: Box<dyn Engine>) -> Self {
        Self { extractor, engine }
    }

    /// The document extractor.
    pub fn extractor(&self) -> &dyn TextExtractor {
        self.extractor.as_ref()
    }

    fn execute(
        &self,
        request: &RunRequest,
        record: &mut MetricsRecord,
        stage: &Cell<Stage>,
    ) -> Result<(), Diagnostic> {
        stage.set(Stage::Extract);
        let text = self.extract(request)?;
        let trimmed = text.trim();

        stage.set(Stage::Baseline);
        record.original_text_bytes = digest::text_size_bytes(trimmed);
        record.gzipped_text_bytes = digest::gzip_size_bytes(trimmed).map_err(|e| {
            Diagnostic::new(
                Stage::Baseline,
                FailureKind::UnexpectedError,
                format!("gzip failed: {}", e),
            )
        })?;
        record.original_text_digest = digest::sha256_hex(trimmed);
        debug!(
            original_bytes = record.original_text_bytes,
            gzipped_bytes = record.gzipped_text_bytes,
            "Baseline measured"
        );

        stage.set(Stage::Encode);
        let artifacts = self.encode(request, &text, record)?;

        stage.set(Stage::MeasureArtifacts);
        record.artifact_primary_bytes = measure(&artifacts.primary, "primary artifact")?;
        record.artifact_index_bytes = measure(&artifacts.index, "index")?;
        debug!(
            primary_bytes = record.artifact_primary_bytes,
            index_bytes = record.artifact_index_bytes,
            "Artifacts measured"
        );

        stage.set(Stage::DecodeFull);
        let decoder = self
            .engine
            .open(&artifacts, request.decoder_config.as_ref())
            .map_err(|e| stage_error(Stage::DecodeFull, FailureKind::DecodingError, &e))?;
        let chunk_count = self.resolve_chunk_count(&artifacts, decoder.as_ref(), record)?;
        let decoded = self.decode_full(decoder.as_ref(), chunk_count, record)?;

        stage.set(Stage::Verify);
        let decoded_trimmed = decoded.trim();
        record.decoded_text_bytes = digest::text_size_bytes(decoded_trimmed);
        record.decoded_text_digest = digest::sha256_hex(decoded_trimmed);
        record.verification = verify(record, &artifacts.index);
        info!(outcome = %record.verification, "Verification finished");

        stage.set(Stage::SampleDecode);
        let ids = select_sample_ids(chunk_count);
        let timings = time_sampled_chunks(decoder.as_ref(), &ids);
        record.decode_avg_sample_seconds = timings.average_seconds();
        debug!(
            sampled = ids.len(),
            failed = timings.failures(),
            avg_seconds = ?record.decode_avg_sample_seconds,
            "Sampled decode finished"
        );

        Ok(())
    }

    fn extract(&self, request: &RunRequest) -> Result<String, Diagnostic> {
        let text = self.extractor.extract(&request.source).ok_or_else(|| {
            Diagnostic::new(
                Stage::Extract,
                FailureKind::ExtractionFailure,
                format!("could not extract text from '{}'", request.filename),
            )
        })?;
        if text.trim().is_empty() {
            return Err(Diagnostic::new(
                Stage::Extract,
                FailureKind::ExtractionFailure,
                format!("'{}' contains no text", request.filename),
            ));
        }
        Ok(text)
    }

    fn encode(
        &self,
        request: &RunRequest,
        text: &str,
        record: &mut MetricsRecord,
    ) -> Result<EncodedArtifacts, Diagnostic> {
        let stem = request.output_stem();
        let encode_request = EncodeRequest {
            text,
            output_stem: &stem,
            codec: request.codec,
            alternate_backend: request.alternate_backend,
            config: request.encoder_config.as_ref(),
        };

        let started = Instant::now();
        let result = self.engine.encode(&encode_request);
        record.encode_seconds = started.elapsed().as_secs_f64();

        let artifacts =
            result.map_err(|e| stage_error(Stage::Encode, FailureKind::EncodingError, &e))?;
        info!(
            encode_seconds = record.encode_seconds,
            primary = %artifacts.primary.display(),
            "Encode finished"
        );
        Ok(artifacts)
    }

    fn resolve_chunk_count(
        &self,
        artifacts: &EncodedArtifacts,
        decoder: &dyn ChunkDecoder,
        record: &mut MetricsRecord,
    ) -> Result<u64, Diagnostic> {
        let index = match IndexSummary::load(&artifacts.index) {
            Ok(summary) => Some(summary),
            Err(err) => {
                warn!(
                    index = %artifacts.index.display(),
                    error = %err,
                    "Index unreadable, falling back to engine stats"
                );
                None
            }
        };

        let needs_stats = index.as_ref().and_then(IndexSummary::chunk_count).is_none();
        let stats = if needs_stats {
            match decoder.stats() {
                Ok(stats) => Some(stats),
                Err(err) => {
                    warn!(error = %err, "Engine stats unavailable");
                    None
                }
            }
        } else {
            None
        };

        let resolution = resolver::resolve(index.as_ref(), stats.as_ref());
        record.chunk_count = resolution.count;
        let count = resolution.count.known().ok_or_else(|| {
            Diagnostic::new(
                Stage::DecodeFull,
                FailureKind::DecodingError,
                "no valid chunk count in the index or the engine stats",
            )
        })?;
        info!(chunk_count = count, source = %resolution.source, "Chunk count resolved");
        Ok(count)
    }

    fn decode_full(
        &self,
        decoder: &dyn ChunkDecoder,
        chunk_count: u64,
        record: &mut MetricsRecord,
    ) -> Result<String, Diagnostic> {
        let started = Instant::now();
        let result = decode_all(decoder, chunk_count);
        record.decode_full_seconds = started.elapsed().as_secs_f64();

        let decoded =
            result.map_err(|e| stage_error(Stage::DecodeFull, FailureKind::DecodingError, &e))?;
        if chunk_count > 0 && decoded.trim().is_empty() {
            return Err(Diagnostic::new(
                Stage::DecodeFull,
                FailureKind::DecodingError,
                format!("full decode returned no text for {} chunks", chunk_count),
            ));
        }
        info!(decode_seconds = record.decode_full_seconds, "Full decode finished");
        Ok(decoded)
    }
}

impl Benchmark for BenchmarkRunner {
    fn run(&self, request: RunRequest) -> MetricsRecord {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "benchmark_run",
            %run_id,
            engine = self.engine.name(),
            file = %request.filename,
            codec = %request.codec,
            alternate_backend = request.alternate_backend
        );
        let _guard = span.enter();

        let mut record =
            MetricsRecord::new(&request.filename, request.codec, request.alternate_backend);
        let stage = Cell::new(Stage::Run);
        info!("Benchmark started");

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.execute(&request, &mut record, &stage)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(diagnostic)) => {
                error!(
                    stage = %diagnostic.stage,
                    kind = %diagnostic.kind,
                    message = %diagnostic.message,
                    "Benchmark stage failed"
                );
                record.diagnostics.push(diagnostic);
            }
            Err(payload) => {
                let message = format!("panic: {}", panic_message(payload.as_ref()));
                error!(stage = %stage.get(), %message, "Benchmark panicked");
                record.push_diagnostic(stage.get(), FailureKind::UnexpectedError, message);
            }
        }

        info!(
            accuracy_passed = record.accuracy_passed(),
            chunk_count = %record.chunk_count,
            diagnostics = record.diagnostics.len(),
            "Benchmark completed"
        );
        record
    }
}

fn stage_error(stage: Stage, kind: FailureKind, err: &EngineError) -> Diagnostic {
    Diagnostic::new(stage, kind, format!("{}: {}", err.type_name(), err))
}

fn measure(path: &Path, label: &str) -> Result<u64, Diagnostic> {
    digest::file_size(path).ok_or_else(|| {
        Diagnostic::new(
            Stage::MeasureArtifacts,
            FailureKind::EncodingError,
            format!(
                "engine reported success but the {} {} is missing",
                label,
                path.display()
            ),
        )
    })
}

fn decode_all(decoder: &dyn ChunkDecoder, chunk_count: u64) -> Result<String, EngineError> {
    let mut text = String::new();
    for id in 0..chunk_count {
        match decoder.get_chunk(id)? {
            Some(chunk) => text.push_str(&chunk),
            None => warn!(chunk_id = id, "Chunk returned no text during full decode"),
        }
    }
    Ok(text)
}

fn short_digest(digest: &str) -> &str {
    digest.get(..DIGEST_PREFIX_CHARS).unwrap_or(digest)
}

/// Classify the outcome and annotate the record on mismatch.
///
/// A mismatch is compared against the text stored in the index: decoded
/// text equal to it means the encoder transformed the input; anything
/// else means the decode is corrupted.
fn verify(record: &mut MetricsRecord, index_path: &Path) -> VerificationOutcome {
    if record.original_text_digest == record.decoded_text_digest {
        return VerificationOutcome::Passed;
    }

    let canonical_digest = match IndexSummary::load_with_text(index_path) {
        Ok(summary) => summary
            .canonical_text()
            .map(|text| digest::sha256_hex(text.trim())),
        Err(err) => {
            warn!(error = %err, "Index unreadable during verification");
            None
        }
    };

    let input = short_digest(&record.original_text_digest).to_string();
    let decoded = short_digest(&record.decoded_text_digest).to_string();
    match canonical_digest {
        Some(canonical) if canonical == record.decoded_text_digest => {
            record.push_diagnostic(
                Stage::Verify,
                FailureKind::VerificationMismatch,
                format!(
                    "decoded text ({}) matches the chunks stored in the index but not the input ({}); the encoder re-chunked or normalized it",
                    decoded, input
                ),
            );
            VerificationOutcome::Transformed
        }
        Some(canonical) => {
            record.push_diagnostic(
                Stage::Verify,
                FailureKind::DecodingError,
                format!(
                    "decoded text ({}) differs from the chunks stored in the index ({})",
                    decoded,
                    short_digest(&canonical)
                ),
            );
            VerificationOutcome::Corrupted
        }
        None => {
            record.push_diagnostic(
                Stage::Verify,
                FailureKind::VerificationMismatch,
                format!(
                    "input ({}) and decoded ({}) digests differ; the encoder may have transformed the input",
                    input, decoded
                ),
            );
            VerificationOutcome::Unexplained
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

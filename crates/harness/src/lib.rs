// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark harness for text-to-video encode/decode engines.
//!
//! One run takes a document through extraction, encoding, full and
//! sampled decoding, and produces a [`MetricsRecord`] that is appended to
//! a CSV metrics log. Sweeps repeat this across codecs and engine modes.
//!
//! # Quick Start
//!
//! ```no_run
//! use vidstore_bench_harness::{run_and_append, BenchmarkRunner, MetricsLog, RunRequest};
//! use vidstore_bench_core::Codec;
//! # fn collaborators() -> (Box<dyn vidstore_bench_core::TextExtractor>, Box<dyn vidstore_bench_core::Engine>) { unimplemented!() }
//!
//! let (extractor, engine) = collaborators();
//! let runner = BenchmarkRunner::new(extractor, engine);
//! let log = MetricsLog::new("data/results/benchmarks.csv");
//!
//! let record = run_and_append(
//!     &runner,
//!     RunRequest::for_path("data/input_docs/report.txt", Codec::H265, false),
//!     &log,
//! )?;
//! println!("accuracy passed: {}", record.accuracy_passed());
//! # Ok::<(), vidstore_bench_core::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`runner`] - the staged benchmark run
//! - [`resolver`] - chunk-count resolution and artifact inspection
//! - [`sampler`] - sampled single-chunk decode timing
//! - [`io`] - the append-only metrics log and JSON output
//! - [`markdown`] - markdown reports
//! - [`sanity`] - post-sweep log checks
//! - [`sweep`] - the experiment orchestrator

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod io;
pub mod markdown;
pub mod resolver;
pub mod runner;
pub mod sampler;
pub mod sanity;
pub mod sweep;

pub use io::{MetricsLog, MetricsRow};
pub use resolver::{inspect_artifacts, resolve_chunk_count, IndexSummary, MetadataReport};
pub use runner::{Benchmark, BenchmarkRunner, RunRequest};
pub use sanity::{check_log, SanityReport};
pub use sweep::{Orchestrator, SweepOutcome, SweepPlan};

use vidstore_bench_core::{MetricsRecord, Result};

/// Run one benchmark and append its record to `log`.
///
/// Failed runs are persisted like clean ones; the record's diagnostics
/// describe what went wrong.
///
/// # Errors
///
/// Returns a persistence error when the log cannot be written.
pub fn run_and_append(
    benchmark: &dyn Benchmark,
    request: RunRequest,
    log: &MetricsLog,
) -> Result<MetricsRecord> {
    let record = benchmark.run(request);
    log.append(std::slice::from_ref(&record))?;
    Ok(record)
}

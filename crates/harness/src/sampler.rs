// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chunk sampling for single-chunk decode latency.

use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vidstore_bench_core::ChunkDecoder;

/// Chunk ids to time: the first, the last and the middle one.
///
/// Returned ascending and without duplicates, so one- and two-chunk
/// artifacts need no special handling.
pub fn select_sample_ids(chunk_count: u64) -> Vec<u64> {
    let mut ids = Vec::with_capacity(3);
    if chunk_count > 0 {
        ids.push(0);
    }
    if chunk_count > 1 {
        ids.push(chunk_count - 1);
    }
    if chunk_count > 2 {
        ids.push(chunk_count / 2);
    }
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Accumulated timings of sampled chunk decodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTimings {
    total: Duration,
    successes: u32,
    failures: u32,
}

impl SampleTimings {
    /// Count a successful decode that took `elapsed`.
    pub fn record_success(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.successes += 1;
    }

    /// Count a decode excluded from the average.
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Decodes included in the average.
    pub fn successes(&self) -> u32 {
        self.successes
    }

    /// Decodes excluded from the average.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Mean seconds per successful decode; `None` when nothing succeeded.
    pub fn average_seconds(&self) -> Option<f64> {
        (self.successes > 0).then(|| self.total.as_secs_f64() / f64::from(self.successes))
    }
}

/// Time one `get_chunk` call per id.
///
/// A call that errors or yields no text is logged and left out of the
/// average; it never fails the caller.
pub fn time_sampled_chunks(decoder: &dyn ChunkDecoder, ids: &[u64]) -> SampleTimings {
    let mut timings = SampleTimings::default();
    for &id in ids {
        let started = Instant::now();
        let result = decoder.get_chunk(id);
        let elapsed = started.elapsed();
        match result {
            Ok(Some(_)) => {
                debug!(
                    chunk_id = id,
                    elapsed_us = elapsed.as_micros() as u64,
                    "Sampled chunk decoded"
                );
                timings.record_success(elapsed);
            }
            Ok(None) => {
                warn!(chunk_id = id, "Sampled chunk returned no text, excluded from timing");
                timings.record_failure();
            }
            Err(err) => {
                warn!(
                    chunk_id = id,
                    error = %err,
                    "Sampled chunk decode failed, excluded from timing"
                );
                timings.record_failure();
            }
        }
    }
    timings
}

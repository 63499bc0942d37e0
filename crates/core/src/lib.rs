// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for the vidstore benchmark harness.
//!
//! - [`record`] - the per-run `MetricsRecord` and its diagnostics
//! - [`codec`] - codecs an engine can be asked for
//! - [`engine`] - collaborator traits (extraction, encode/decode engine)
//! - [`digest`] - hashing and sizing helpers
//! - [`settings`] - layered harness settings
//! - [`error`] - shared error types

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod codec;
pub mod digest;
pub mod engine;
pub mod error;
pub mod record;
pub mod settings;

pub use codec::Codec;
pub use engine::{
    ChunkDecoder, EncodeRequest, EncodedArtifacts, Engine, EngineConfig, EngineStats,
    TextExtractor, TextSource,
};
pub use error::{EngineError, Error, Result};
pub use record::{
    ChunkCount, Diagnostic, FailureKind, MetricsRecord, Stage, VerificationOutcome,
};
pub use settings::Settings;

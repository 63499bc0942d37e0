// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Collaborator contracts the harness drives.
//!
//! The harness treats text extraction and the encode/decode engine as black
//! boxes. Implement these traits to benchmark a new engine; the
//! `vidstore-bench-adapters` crate ships a reference local engine and an
//! adapter for external engine executables.

use crate::codec::Codec;
use crate::error::EngineError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Free-form engine configuration, passed through untouched.
pub type EngineConfig = Map<String, Value>;

/// Self-reported engine statistics.
pub type EngineStats = Map<String, Value>;

/// Where a document's bytes come from.
#[derive(Debug, Clone)]
pub enum TextSource {
    /// A file on disk.
    Path(PathBuf),
    /// An in-memory upload; `name` carries the original file name.
    Bytes {
        /// Original file name, used for type detection.
        name: String,
        /// Raw document bytes.
        data: Vec<u8>,
    },
}

impl TextSource {
    /// Lowercase extension of the underlying file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        let name: &Path = match self {
            TextSource::Path(path) => path.as_path(),
            TextSource::Bytes { name, .. } => Path::new(name),
        };
        name.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Extracts plain text from documents.
pub trait TextExtractor {
    /// Extract the document's text.
    ///
    /// Returns `None` on any failure (unsupported type, unreadable file,
    /// parse error) so callers can report extraction failures uniformly.
    fn extract(&self, source: &TextSource) -> Option<String>;

    /// Lowercase file extensions, without the dot, this extractor handles.
    fn supported_extensions(&self) -> Vec<String>;
}

/// Parameters of one encode call.
#[derive(Debug, Clone)]
pub struct EncodeRequest<'a> {
    /// Text to encode, exactly as supplied by the user.
    pub text: &'a str,
    /// Stem for the produced file names.
    pub output_stem: &'a str,
    /// Requested codec.
    pub codec: Codec,
    /// Whether to use the engine's alternate backend instead of the native path.
    pub alternate_backend: bool,
    /// Engine-specific options.
    pub config: Option<&'a EngineConfig>,
}

/// Files produced by a successful encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifacts {
    /// The primary (video) artifact.
    pub primary: PathBuf,
    /// The side index describing chunks.
    pub index: PathBuf,
}

/// Reads chunks back out of encoded artifacts.
pub trait ChunkDecoder {
    /// Text of chunk `id`; `Ok(None)` when the id is out of range or the
    /// chunk has no text.
    fn get_chunk(&self, id: u64) -> Result<Option<String>, EngineError>;

    /// The engine's own statistics about the artifacts.
    fn stats(&self) -> Result<EngineStats, EngineError>;
}

/// A text-to-video encode/decode engine.
pub trait Engine {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Encode text into a primary artifact and an index.
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<EncodedArtifacts, EngineError>;

    /// Open a decoder over previously encoded artifacts.
    fn open(
        &self,
        artifacts: &EncodedArtifacts,
        config: Option<&EngineConfig>,
    ) -> Result<Box<dyn ChunkDecoder>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_path_and_bytes() {
        let path = TextSource::Path(PathBuf::from("/docs/Report.TXT"));
        assert_eq!(path.extension().as_deref(), Some("txt"));

        let bytes = TextSource::Bytes {
            name: "upload.md".to_string(),
            data: Vec::new(),
        };
        assert_eq!(bytes.extension().as_deref(), Some("md"));

        let bare = TextSource::Bytes {
            name: "README".to_string(),
            data: Vec::new(),
        };
        assert_eq!(bare.extension(), None);
    }
}

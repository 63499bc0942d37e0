// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Plain-text extraction.

use std::borrow::Cow;
use tracing::{debug, warn};
use vidstore_bench_core::{TextExtractor, TextSource};

/// Extensions handled by [`PlainTextExtractor::default`].
pub const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md"];

const UTF8_BOM: &str = "\u{feff}";

/// Extracts text from plain-text documents on disk or in memory.
///
/// Bytes are decoded as UTF-8, falling back to Latin-1 for legacy files.
/// Documents whose extension is not in the supported list yield `None`.
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    extensions: Vec<String>,
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::with_extensions(PLAIN_TEXT_EXTENSIONS.iter().copied())
    }
}

impl PlainTextExtractor {
    /// Extractor accepting the given extensions (case-insensitive, no dot).
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn accepts(&self, source: &TextSource) -> bool {
        source
            .extension()
            .map(|ext| self.extensions.iter().any(|known| *known == ext))
            .unwrap_or(false)
    }
}

/// Decode bytes as UTF-8, or as Latin-1 when they are not valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix(UTF8_BOM).unwrap_or(text).to_string(),
        Err(err) => {
            debug!(error = %err, "input is not UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, source: &TextSource) -> Option<String> {
        if !self.accepts(source) {
            warn!(
                extension = ?source.extension(),
                supported = ?self.extensions,
                "Unsupported document type"
            );
            return None;
        }

        let bytes: Cow<'_, [u8]> = match source {
            TextSource::Path(path) => match std::fs::read(path) {
                Ok(bytes) => Cow::Owned(bytes),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Failed to read document");
                    return None;
                }
            },
            TextSource::Bytes { data, .. } => Cow::Borrowed(data.as_slice()),
        };

        Some(decode_text(&bytes))
    }

    fn supported_extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }
}

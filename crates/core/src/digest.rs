// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hashing and sizing helpers for text blobs and artifacts.

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::path::Path;

/// Size of `text` in bytes when UTF-8 encoded.
pub fn text_size_bytes(text: &str) -> u64 {
    text.len() as u64
}

/// Size of `text` after gzip compression at the default level.
///
/// Empty text has a gzipped size of zero rather than the size of an empty
/// gzip stream, so it compares cleanly against empty artifacts.
pub fn gzip_size_bytes(text: &str) -> io::Result<u64> {
    if text.is_empty() {
        return Ok(0);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    Ok(encoder.finish()?.len() as u64)
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `text`.
pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Size of the file at `path`, or `None` when it does not exist or is not a
/// regular file.
pub fn file_size(path: impl AsRef<Path>) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_size_counts_utf8_bytes() {
        assert_eq!(text_size_bytes("abc"), 3);
        assert_eq!(text_size_bytes("é"), 2);
        assert_eq!(text_size_bytes(""), 0);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_gzip_compresses_repetitive_text() {
        let text = "the same line again\n".repeat(200);
        let gz = gzip_size_bytes(&text).unwrap();
        assert!(gz > 0);
        assert!(gz < text_size_bytes(&text));
        assert_eq!(gzip_size_bytes("").unwrap(), 0);
    }

    #[test]
    fn test_file_size_missing_and_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        assert_eq!(file_size(&path), None);
        std::fs::write(&path, b"12345").unwrap();
        assert_eq!(file_size(&path), Some(5));
        assert_eq!(file_size(dir.path()), None);
    }
}

// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reference engine that stores text chunks as length-prefixed frames.
//!
//! The local engine exists so the harness can be exercised end to end
//! without an external engine installed. Its index follows the layout the
//! harness' metadata resolver understands:
//!
//! ```text
//! {
//!   "metadata":        [{"id", "frame", "offset", "length", "text"}, ...],
//!   "chunk_to_frame":  {"0": 0, ...},
//!   "frame_to_chunks": {"0": [0], ...},
//!   "config":          {"engine", "codec", "alternate_backend", "chunking": {...}}
//! }
//! ```
//!
//! The primary artifact is `VSBF`, a format version byte, the codec name
//! (length-prefixed), the frame count (u32 LE), then each frame as a u32 LE
//! byte length followed by the chunk's UTF-8 bytes.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vidstore_bench_core::settings::Settings;
use vidstore_bench_core::{
    ChunkDecoder, EncodeRequest, EncodedArtifacts, Engine, EngineConfig, EngineError, EngineStats,
};

const MAGIC: &[u8; 4] = b"VSBF";
const FORMAT_VERSION: u8 = 1;

/// Chunking parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunking {
    /// Characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
}

/// Split `text` into windows of `chunk_size` characters advancing by
/// `chunk_size - overlap`. The last window ends exactly at the end of the
/// text, so text no longer than one chunk yields a single chunk.
pub fn chunk_text(text: &str, chunking: Chunking) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunking.chunk_size == 0 {
        return Vec::new();
    }

    let step = chunking.chunk_size.saturating_sub(chunking.overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunking.chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Map serialized in insertion order.
struct OrderedMap<V>(Vec<(String, V)>);

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct ChunkEntry<'a> {
    id: u64,
    frame: u64,
    offset: u64,
    length: u64,
    text: &'a str,
}

#[derive(Serialize)]
struct IndexConfig<'a> {
    engine: &'static str,
    codec: &'a str,
    alternate_backend: bool,
    chunking: Chunking,
}

#[derive(Serialize)]
struct IndexDocument<'a> {
    metadata: Vec<ChunkEntry<'a>>,
    chunk_to_frame: OrderedMap<u64>,
    frame_to_chunks: OrderedMap<Vec<u64>>,
    config: IndexConfig<'a>,
}

/// The built-in reference engine.
#[derive(Debug, Clone)]
pub struct LocalEngine {
    output_dir: PathBuf,
    chunking: Chunking,
}

impl LocalEngine {
    /// Engine writing into `output_dir` with the given default chunking.
    pub fn new(output_dir: impl Into<PathBuf>, chunk_size: usize, overlap: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            chunking: Chunking {
                chunk_size,
                overlap,
            },
        }
    }

    /// Engine configured from harness settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.paths.artifact_dir.clone(),
            settings.engine.chunk_size,
            settings.engine.overlap,
        )
    }

    /// Default chunking, overridden per call by the `chunk_size` and
    /// `overlap` keys of the encoder config.
    fn chunking_for(&self, config: Option<&EngineConfig>) -> Result<Chunking, EngineError> {
        let read = |key: &str, default: usize| -> Result<usize, EngineError> {
            match config.and_then(|c| c.get(key)) {
                None => Ok(default),
                Some(value) => value.as_u64().map(|v| v as usize).ok_or_else(|| {
                    EngineError::Encoding(format!(
                        "config key '{}' must be a non-negative integer, got {}",
                        key, value
                    ))
                }),
            }
        };

        let chunking = Chunking {
            chunk_size: read("chunk_size", self.chunking.chunk_size)?,
            overlap: read("overlap", self.chunking.overlap)?,
        };
        if chunking.chunk_size == 0 || chunking.overlap >= chunking.chunk_size {
            return Err(EngineError::Encoding(format!(
                "invalid chunking: chunk_size={} overlap={}",
                chunking.chunk_size, chunking.overlap
            )));
        }
        Ok(chunking)
    }

    fn write_primary(
        path: &Path,
        codec: &str,
        chunks: &[String],
    ) -> Result<Vec<(u64, u64)>, EngineError> {
        let codec_bytes = codec.as_bytes();
        let codec_len = u8::try_from(codec_bytes.len())
            .map_err(|_| EngineError::Encoding(format!("codec name too long: {}", codec)))?;
        let frame_count = u32::try_from(chunks.len())
            .map_err(|_| EngineError::Encoding("too many chunks for one artifact".to_string()))?;

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        writer.write_all(&[FORMAT_VERSION, codec_len])?;
        writer.write_all(codec_bytes)?;
        writer.write_all(&frame_count.to_le_bytes())?;

        let mut offset = (MAGIC.len() + 2 + codec_bytes.len() + 4) as u64;
        let mut frames = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let bytes = chunk.as_bytes();
            let length = u32::try_from(bytes.len())
                .map_err(|_| EngineError::Encoding("chunk larger than 4 GiB".to_string()))?;
            writer.write_all(&length.to_le_bytes())?;
            offset += 4;
            frames.push((offset, u64::from(length)));
            writer.write_all(bytes)?;
            offset += u64::from(length);
        }
        writer.flush()?;
        Ok(frames)
    }
}

impl Engine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<EncodedArtifacts, EngineError> {
        let chunking = self.chunking_for(request.config)?;
        if request.alternate_backend {
            debug!("local engine has no alternate backend, encoding on the native path");
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let primary = self.output_dir.join(format!(
            "{}.{}",
            request.output_stem,
            request.codec.container_extension()
        ));
        let index = self
            .output_dir
            .join(format!("{}_index.json", request.output_stem));

        let chunks = chunk_text(request.text, chunking);
        let frames = Self::write_primary(&primary, request.codec.as_str(), &chunks)?;

        let document = IndexDocument {
            metadata: chunks
                .iter()
                .zip(&frames)
                .enumerate()
                .map(|(id, (text, &(offset, length)))| ChunkEntry {
                    id: id as u64,
                    frame: id as u64,
                    offset,
                    length,
                    text,
                })
                .collect(),
            chunk_to_frame: OrderedMap(
                (0..chunks.len() as u64).map(|id| (id.to_string(), id)).collect(),
            ),
            frame_to_chunks: OrderedMap(
                (0..chunks.len() as u64)
                    .map(|id| (id.to_string(), vec![id]))
                    .collect(),
            ),
            config: IndexConfig {
                engine: "local",
                codec: request.codec.as_str(),
                alternate_backend: request.alternate_backend,
                chunking,
            },
        };
        let mut writer = BufWriter::new(File::create(&index)?);
        serde_json::to_writer(&mut writer, &document)?;
        writer.flush()?;

        info!(
            primary = %primary.display(),
            index = %index.display(),
            chunks = chunks.len(),
            codec = %request.codec,
            "Local engine encode complete"
        );
        Ok(EncodedArtifacts { primary, index })
    }

    fn open(
        &self,
        artifacts: &EncodedArtifacts,
        config: Option<&EngineConfig>,
    ) -> Result<Box<dyn ChunkDecoder>, EngineError> {
        if config.is_some() {
            debug!("local decoder ignores decoder config");
        }
        Ok(Box::new(LocalDecoder::open(artifacts)?))
    }
}

#[derive(Deserialize)]
struct FrameRef {
    offset: u64,
    length: u64,
}

#[derive(Deserialize)]
struct StoredConfig {
    codec: String,
    chunking: Chunking,
}

#[derive(Deserialize)]
struct FrameIndex {
    metadata: Vec<FrameRef>,
    config: StoredConfig,
}

/// Decoder over artifacts written by [`LocalEngine`].
#[derive(Debug)]
pub struct LocalDecoder {
    primary: PathBuf,
    frames: Vec<(u64, u64)>,
    codec: String,
    chunking: Chunking,
}

impl LocalDecoder {
    /// Validate the primary artifact header and load frame offsets.
    pub fn open(artifacts: &EncodedArtifacts) -> Result<Self, EngineError> {
        for path in [&artifacts.primary, &artifacts.index] {
            if !path.is_file() {
                return Err(EngineError::Decoding(format!(
                    "artifact not found: {}",
                    path.display()
                )));
            }
        }

        let mut header = [0u8; 5];
        File::open(&artifacts.primary)?
            .read_exact(&mut header)
            .map_err(|e| EngineError::Decoding(format!("truncated primary artifact: {}", e)))?;
        if &header[..4] != MAGIC || header[4] != FORMAT_VERSION {
            return Err(EngineError::Decoding(format!(
                "{} is not a local engine artifact",
                artifacts.primary.display()
            )));
        }

        let index: FrameIndex =
            serde_json::from_reader(BufReader::new(File::open(&artifacts.index)?))?;
        Ok(Self {
            primary: artifacts.primary.clone(),
            frames: index
                .metadata
                .iter()
                .map(|frame| (frame.offset, frame.length))
                .collect(),
            codec: index.config.codec,
            chunking: index.config.chunking,
        })
    }
}

impl ChunkDecoder for LocalDecoder {
    fn get_chunk(&self, id: u64) -> Result<Option<String>, EngineError> {
        let Some(&(offset, length)) = usize::try_from(id).ok().and_then(|i| self.frames.get(i))
        else {
            return Ok(None);
        };

        let mut file = File::open(&self.primary)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)
            .map_err(|e| EngineError::Decoding(format!("frame {} truncated: {}", id, e)))?;
        String::from_utf8(buf)
            .map(Some)
            .map_err(|e| EngineError::Decoding(format!("frame {} is not UTF-8: {}", id, e)))
    }

    fn stats(&self) -> Result<EngineStats, EngineError> {
        let total = self.frames.len();
        let mut stats = EngineStats::new();
        stats.insert("engine".into(), json!("local"));
        stats.insert("codec".into(), json!(self.codec));
        stats.insert("total_chunks".into(), json!(total));
        stats.insert(
            "index_summary".into(),
            json!({
                "total_chunks": total,
                "total_frames": total,
                "chunk_size": self.chunking.chunk_size,
                "overlap": self.chunking.overlap,
            }),
        );
        stats.insert(
            "primary_bytes".into(),
            json!(std::fs::metadata(&self.primary)?.len()),
        );
        Ok(stats)
    }
}

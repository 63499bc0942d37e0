// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chunk-count resolution and bounded inspection of engine artifacts.
//!
//! Index files can be large, so [`IndexSummary`] is built by a streaming
//! visitor: the `metadata` list is counted entry by entry, and only the
//! first few entries and mapping pairs are kept for display.

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};
use vidstore_bench_core::{
    ChunkCount, EncodedArtifacts, Engine, EngineConfig, EngineError, EngineStats,
};

/// Metadata entries kept in [`IndexPreview::chunk_metadata_preview`].
pub const METADATA_PREVIEW_ENTRIES: usize = 2;

/// Pairs kept from each chunk/frame mapping.
pub const MAPPING_PREVIEW_PAIRS: usize = 5;

/// Bounded excerpt of an index document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexPreview {
    /// First metadata entries, with `text` replaced by `text_length`.
    pub chunk_metadata_preview: Vec<Value>,
    /// First pairs of `chunk_to_frame`.
    pub chunk_to_frame_preview: Map<String, Value>,
    /// First pairs of `frame_to_chunks`.
    pub frame_to_chunks_preview: Map<String, Value>,
    /// `config.chunking`, when present.
    pub chunking_config: Option<Value>,
}

/// What the harness needs from an index document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSummary {
    metadata_len: Option<u64>,
    preview: IndexPreview,
    canonical_text: Option<String>,
}

impl IndexSummary {
    /// Summarize the index at `path` without keeping chunk texts.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::load_inner(path.as_ref(), false)
    }

    /// Like [`IndexSummary::load`], also concatenating every entry's `text`
    /// into [`IndexSummary::canonical_text`].
    pub fn load_with_text(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::load_inner(path.as_ref(), true)
    }

    fn load_inner(path: &Path, collect_text: bool) -> Result<Self, EngineError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file), collect_text)?)
    }

    /// Summarize an index document read from `reader`.
    pub fn from_reader<R: Read>(reader: R, collect_text: bool) -> serde_json::Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_reader(reader);
        let summary = IndexSeed { collect_text }.deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(summary)
    }

    /// Number of metadata entries; `None` when `metadata` is absent or not a list.
    pub fn chunk_count(&self) -> Option<u64> {
        self.metadata_len
    }

    /// The bounded excerpt.
    pub fn preview(&self) -> &IndexPreview {
        &self.preview
    }

    /// Concatenated chunk texts, when loaded with text and at least one
    /// entry carried a `text` string.
    pub fn canonical_text(&self) -> Option<&str> {
        self.canonical_text.as_deref()
    }
}

/// Accepts any JSON value as "not the expected shape" and yields the default.
macro_rules! default_for_other_shapes {
    () => {
        fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok(Default::default())
        }
        fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
            Ok(Default::default())
        }
        fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
            Ok(Default::default())
        }
        fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
            Ok(Default::default())
        }
        fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
            Ok(Default::default())
        }
        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Default::default())
        }
    };
}

struct IndexSeed {
    collect_text: bool,
}

impl<'de> DeserializeSeed<'de> for IndexSeed {
    type Value = IndexSummary;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<IndexSummary, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for IndexSeed {
    type Value = IndexSummary;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an index object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<IndexSummary, A::Error> {
        let mut summary = IndexSummary::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "metadata" => {
                    let scan = map.next_value_seed(MetadataSeed {
                        collect_text: self.collect_text,
                    })?;
                    summary.metadata_len = scan.len;
                    summary.preview.chunk_metadata_preview = scan.preview;
                    summary.canonical_text = scan.text;
                }
                "chunk_to_frame" => {
                    summary.preview.chunk_to_frame_preview =
                        map.next_value_seed(BoundedMapSeed(MAPPING_PREVIEW_PAIRS))?;
                }
                "frame_to_chunks" => {
                    summary.preview.frame_to_chunks_preview =
                        map.next_value_seed(BoundedMapSeed(MAPPING_PREVIEW_PAIRS))?;
                }
                "config" => {
                    let config: Value = map.next_value()?;
                    summary.preview.chunking_config = config.get("chunking").cloned();
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(summary)
    }
}

#[derive(Default)]
struct MetadataScan {
    len: Option<u64>,
    preview: Vec<Value>,
    text: Option<String>,
}

struct MetadataSeed {
    collect_text: bool,
}

impl<'de> DeserializeSeed<'de> for MetadataSeed {
    type Value = MetadataScan;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<MetadataScan, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for MetadataSeed {
    type Value = MetadataScan;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of chunk metadata")
    }

    default_for_other_shapes!();

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<MetadataScan, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(MetadataScan::default())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<MetadataScan, A::Error> {
        let mut len = 0u64;
        let mut preview = Vec::new();
        let mut text: Option<String> = None;

        loop {
            let keep = preview.len() < METADATA_PREVIEW_ENTRIES;
            let entry = if keep || self.collect_text {
                match seq.next_element::<Value>()? {
                    Some(value) => value,
                    None => break,
                }
            } else {
                match seq.next_element::<IgnoredAny>()? {
                    Some(_) => Value::Null,
                    None => break,
                }
            };
            len += 1;

            if self.collect_text {
                if let Some(chunk) = entry.get("text").and_then(Value::as_str) {
                    text.get_or_insert_with(String::new).push_str(chunk);
                }
            }
            if keep {
                preview.push(redact_text(entry));
            }
        }

        Ok(MetadataScan {
            len: Some(len),
            preview,
            text,
        })
    }
}

fn redact_text(mut entry: Value) -> Value {
    if let Some(object) = entry.as_object_mut() {
        if let Some(Value::String(text)) = object.remove("text") {
            object.insert("text_length".into(), Value::from(text.chars().count()));
        }
    }
    entry
}

struct BoundedMapSeed(usize);

impl<'de> DeserializeSeed<'de> for BoundedMapSeed {
    type Value = Map<String, Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for BoundedMapSeed {
    type Value = Map<String, Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping")
    }

    default_for_other_shapes!();

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Map::new())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut kept = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if kept.len() < self.0 {
                let value: Value = map.next_value()?;
                kept.insert(key, value);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(kept)
    }
}

/// Where a resolved chunk count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkCountSource {
    /// Length of the index's `metadata` list.
    IndexMetadata,
    /// `stats.index_summary.total_chunks`.
    StatsIndexSummary,
    /// `stats.total_chunks`.
    StatsTotalChunks,
    /// Nothing usable.
    Unresolved,
}

impl fmt::Display for ChunkCountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkCountSource::IndexMetadata => "index metadata",
            ChunkCountSource::StatsIndexSummary => "stats.index_summary.total_chunks",
            ChunkCountSource::StatsTotalChunks => "stats.total_chunks",
            ChunkCountSource::Unresolved => "unresolved",
        };
        f.write_str(name)
    }
}

/// A chunk count and its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The count.
    pub count: ChunkCount,
    /// Where it came from.
    pub source: ChunkCountSource,
}

/// Resolve the chunk count, first source wins.
///
/// The index metadata length is preferred; then the engine stats'
/// `index_summary.total_chunks`, then `total_chunks`. Only non-negative
/// integers are accepted, so a present but invalid value falls through.
pub fn resolve(index: Option<&IndexSummary>, stats: Option<&EngineStats>) -> Resolution {
    if let Some(n) = index.and_then(IndexSummary::chunk_count) {
        return Resolution {
            count: ChunkCount::Known(n),
            source: ChunkCountSource::IndexMetadata,
        };
    }

    let nested = stats
        .and_then(|s| s.get("index_summary"))
        .and_then(|summary| summary.get("total_chunks"))
        .and_then(Value::as_u64);
    if let Some(n) = nested {
        return Resolution {
            count: ChunkCount::Known(n),
            source: ChunkCountSource::StatsIndexSummary,
        };
    }

    match stats.and_then(|s| s.get("total_chunks")).and_then(Value::as_u64) {
        Some(n) => Resolution {
            count: ChunkCount::Known(n),
            source: ChunkCountSource::StatsTotalChunks,
        },
        None => Resolution {
            count: ChunkCount::Unknown,
            source: ChunkCountSource::Unresolved,
        },
    }
}

/// [`resolve`] without the provenance.
pub fn resolve_chunk_count(
    index: Option<&IndexSummary>,
    stats: Option<&EngineStats>,
) -> ChunkCount {
    resolve(index, stats).count
}

/// Everything learned about a pair of artifacts without decoding them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataReport {
    /// Resolved chunk count.
    pub chunk_count: ChunkCount,
    /// Where the count came from.
    pub chunk_count_source: ChunkCountSource,
    /// Bounded index excerpt, when the index was readable.
    pub index_preview: Option<IndexPreview>,
    /// The engine's stats, when the artifacts could be opened.
    pub engine_stats: Option<EngineStats>,
    /// Problems met along the way, in order.
    pub errors: Vec<String>,
}

/// Inspect artifacts: summarize the index, ask the engine for its stats and
/// resolve the chunk count. Never fails; problems land in `errors`.
pub fn inspect_artifacts(
    engine: &dyn Engine,
    artifacts: &EncodedArtifacts,
    decoder_config: Option<&EngineConfig>,
) -> MetadataReport {
    let mut errors = Vec::new();

    let index = match IndexSummary::load(&artifacts.index) {
        Ok(summary) => Some(summary),
        Err(err) => {
            warn!(index = %artifacts.index.display(), error = %err, "Index unreadable");
            errors.push(format!("index {}: {}", artifacts.index.display(), err));
            None
        }
    };

    let engine_stats = match engine
        .open(artifacts, decoder_config)
        .and_then(|decoder| decoder.stats())
    {
        Ok(stats) => Some(stats),
        Err(err) => {
            warn!(engine = engine.name(), error = %err, "Engine stats unavailable");
            errors.push(format!("engine stats: {}", err));
            None
        }
    };

    let resolution = resolve(index.as_ref(), engine_stats.as_ref());
    debug!(chunk_count = %resolution.count, source = %resolution.source, "Inspected artifacts");

    MetadataReport {
        chunk_count: resolution.count,
        chunk_count_source: resolution.source,
        index_preview: index.map(|summary| summary.preview),
        engine_stats,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use vidstore_bench_adapters::LocalEngine;
    use vidstore_bench_core::{Codec, EncodeRequest};

    fn summary(doc: Value, collect_text: bool) -> IndexSummary {
        IndexSummary::from_reader(doc.to_string().as_bytes(), collect_text).unwrap()
    }

    fn stats(doc: Value) -> EngineStats {
        match doc {
            Value::Object(map) => map,
            _ => panic!("stats must be an object"),
        }
    }

    #[test]
    fn test_metadata_length_wins() {
        let index = summary(json!({"metadata": [{}, {}, {}]}), false);
        let stats = stats(json!({"index_summary": {"total_chunks": 9}, "total_chunks": 8}));
        let resolution = resolve(Some(&index), Some(&stats));
        assert_eq!(resolution.count, ChunkCount::Known(3));
        assert_eq!(resolution.source, ChunkCountSource::IndexMetadata);
    }

    #[test]
    fn test_empty_metadata_list_is_zero_chunks() {
        let index = summary(json!({"metadata": []}), false);
        assert_eq!(resolve_chunk_count(Some(&index), None), ChunkCount::Known(0));
    }

    #[test]
    fn test_falls_back_to_stats() {
        let index = summary(json!({"metadata": "not a list"}), false);
        assert_eq!(index.chunk_count(), None);

        let nested = stats(json!({"index_summary": {"total_chunks": 7}, "total_chunks": 4}));
        let resolution = resolve(Some(&index), Some(&nested));
        assert_eq!(resolution.count, ChunkCount::Known(7));
        assert_eq!(resolution.source, ChunkCountSource::StatsIndexSummary);

        let flat = stats(json!({"total_chunks": 4}));
        let resolution = resolve(None, Some(&flat));
        assert_eq!(resolution.count, ChunkCount::Known(4));
        assert_eq!(resolution.source, ChunkCountSource::StatsTotalChunks);
    }

    #[test]
    fn test_invalid_counts_fall_through() {
        let bad_nested = stats(json!({"index_summary": {"total_chunks": -1}, "total_chunks": 5}));
        assert_eq!(resolve_chunk_count(None, Some(&bad_nested)), ChunkCount::Known(5));

        let all_bad = stats(json!({"index_summary": {"total_chunks": "12"}, "total_chunks": 2.5}));
        let resolution = resolve(None, Some(&all_bad));
        assert_eq!(resolution.count, ChunkCount::Unknown);
        assert_eq!(resolution.source, ChunkCountSource::Unresolved);

        assert_eq!(resolve_chunk_count(None, None), ChunkCount::Unknown);
    }

    #[test]
    fn test_preview_is_bounded_and_redacted() {
        let metadata: Vec<Value> = (0..10)
            .map(|i| json!({"id": i, "frame": i, "text": "héllo"}))
            .collect();
        let chunk_to_frame: Map<String, Value> =
            (0..10).map(|i| (i.to_string(), json!(i))).collect();
        let doc = json!({
            "metadata": metadata,
            "chunk_to_frame": chunk_to_frame,
            "frame_to_chunks": {"0": [0], "1": [1]},
            "config": {"chunking": {"chunk_size": 500, "overlap": 50}, "codec": "mp4v"},
            "extra": {"ignored": true}
        });
        let index = summary(doc, false);

        assert_eq!(index.chunk_count(), Some(10));
        let preview = index.preview();
        assert_eq!(preview.chunk_metadata_preview.len(), METADATA_PREVIEW_ENTRIES);
        assert_eq!(preview.chunk_metadata_preview[0]["text_length"], 5);
        assert!(preview.chunk_metadata_preview[0].get("text").is_none());
        assert_eq!(preview.chunk_to_frame_preview.len(), MAPPING_PREVIEW_PAIRS);
        assert_eq!(preview.frame_to_chunks_preview.len(), 2);
        assert_eq!(
            preview.chunking_config,
            Some(json!({"chunk_size": 500, "overlap": 50}))
        );
        assert!(index.canonical_text().is_none());
    }

    #[test]
    fn test_canonical_text_concatenates_entries() {
        let doc = json!({"metadata": [{"text": "ab"}, {"id": 1}, {"text": "cd"}, {"text": "ef"}]});
        let index = summary(doc, true);
        assert_eq!(index.chunk_count(), Some(4));
        assert_eq!(index.canonical_text(), Some("abcdef"));

        let no_text = summary(json!({"metadata": [{"id": 0}]}), true);
        assert_eq!(no_text.canonical_text(), None);
    }

    #[test]
    fn test_malformed_index_is_an_error() {
        assert!(IndexSummary::from_reader(&b"[1, 2, 3]"[..], false).is_err());
        assert!(IndexSummary::from_reader(&b"{\"metadata\": [1, "[..], false).is_err());
        assert!(IndexSummary::load("/no/such/index.json").is_err());
    }

    #[test]
    fn test_inspect_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new(dir.path(), 10, 0);
        let artifacts = engine
            .encode(&EncodeRequest {
                text: "a short document split into a few chunks",
                output_stem: "doc",
                codec: Codec::H264,
                alternate_backend: false,
                config: None,
            })
            .unwrap();

        let first = inspect_artifacts(&engine, &artifacts, None);
        let second = inspect_artifacts(&engine, &artifacts, None);
        assert_eq!(first, second);
        assert_eq!(first.chunk_count, ChunkCount::Known(4));
        assert_eq!(first.chunk_count_source, ChunkCountSource::IndexMetadata);
        assert!(first.engine_stats.is_some());
        assert!(first.errors.is_empty());
    }

    #[test]
    fn test_inspect_missing_artifacts_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new(dir.path(), 10, 0);
        let artifacts = EncodedArtifacts {
            primary: PathBuf::from("/missing/doc.mp4"),
            index: PathBuf::from("/missing/doc_index.json"),
        };
        let report = inspect_artifacts(&engine, &artifacts, None);
        assert_eq!(report.chunk_count, ChunkCount::Unknown);
        assert_eq!(report.errors.len(), 2);
        assert!(report.index_preview.is_none());
    }
}

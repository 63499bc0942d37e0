// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown reports over metrics log rows.

use crate::io::MetricsRow;
use std::collections::BTreeMap;
use std::fmt::Write;

const ERROR_PREVIEW_CHARS: usize = 60;

fn format_optional_seconds(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn format_ratio(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}x", v))
        .unwrap_or_else(|| "-".to_string())
}

fn engine_mode(flag: bool) -> &'static str {
    if flag {
        "alt"
    } else {
        "native"
    }
}

fn error_preview(row: &MetricsRow) -> String {
    match row.error_message.as_deref() {
        Some(msg) if !msg.trim().is_empty() => {
            let escaped = msg.replace('|', "\\|");
            if escaped.chars().count() > ERROR_PREVIEW_CHARS {
                let head: String = escaped.chars().take(ERROR_PREVIEW_CHARS - 3).collect();
                format!("{}...", head)
            } else {
                escaped
            }
        }
        _ => String::new(),
    }
}

/// Generate a markdown summary: one table row per run, then per-codec
/// aggregates.
pub fn generate_summary(rows: &[MetricsRow]) -> String {
    let mut output = String::new();

    writeln!(output, "# Benchmark Summary").unwrap();
    writeln!(output).unwrap();
    writeln!(output, "Generated: {}", chrono::Utc::now().to_rfc3339()).unwrap();
    writeln!(output).unwrap();
    writeln!(output, "## Runs").unwrap();
    writeln!(output).unwrap();
    writeln!(
        output,
        "| File | Codec | Mode | Chunks | Accuracy | Artifact / gzip | Encode (s) | Decode (s) | Sample (s) | Error |"
    )
    .unwrap();
    writeln!(
        output,
        "|------|-------|------|--------|----------|-----------------|------------|------------|------------|-------|"
    )
    .unwrap();

    for row in rows {
        writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {:.4} | {:.4} | {} | {} |",
            row.original_filename,
            row.encoder_codec,
            engine_mode(row.engine_mode_flag),
            row.chunk_count,
            if row.accuracy_passed { "pass" } else { "fail" },
            format_ratio(row.storage_ratio_vs_gzip()),
            row.encode_seconds,
            row.decode_full_seconds,
            format_optional_seconds(row.decode_avg_sample_seconds),
            error_preview(row),
        )
        .unwrap();
    }

    let mut by_codec: BTreeMap<&str, Vec<&MetricsRow>> = BTreeMap::new();
    for row in rows {
        by_codec.entry(row.encoder_codec.as_str()).or_default().push(row);
    }

    if !by_codec.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "## By Codec").unwrap();
        writeln!(output).unwrap();
        writeln!(
            output,
            "| Codec | Runs | Passed | Errors | Mean encode (s) | Mean artifact bytes |"
        )
        .unwrap();
        writeln!(
            output,
            "|-------|------|--------|--------|-----------------|---------------------|"
        )
        .unwrap();
        for (codec, group) in &by_codec {
            let runs = group.len();
            let passed = group.iter().filter(|r| r.accuracy_passed).count();
            let errors = group.iter().filter(|r| r.has_error()).count();
            let mean_encode = group.iter().map(|r| r.encode_seconds).sum::<f64>() / runs as f64;
            let mean_bytes =
                group.iter().map(|r| r.total_artifact_bytes).sum::<u64>() / runs as u64;
            writeln!(
                output,
                "| {} | {} | {} | {} | {:.4} | {} |",
                codec, runs, passed, errors, mean_encode, mean_bytes
            )
            .unwrap();
        }
    }

    writeln!(output).unwrap();
    writeln!(output, "---").unwrap();
    writeln!(output, "Total runs: {}", rows.len()).unwrap();

    output
}

/// Generate a detailed report with one section per run.
pub fn generate_detailed_report(rows: &[MetricsRow]) -> String {
    let mut output = String::new();

    writeln!(output, "# Detailed Benchmark Report").unwrap();
    writeln!(output).unwrap();
    writeln!(output, "Generated: {}", chrono::Utc::now().to_rfc3339()).unwrap();
    writeln!(output).unwrap();

    for row in rows {
        writeln!(
            output,
            "## {} ({}, {})",
            row.original_filename,
            row.encoder_codec,
            engine_mode(row.engine_mode_flag)
        )
        .unwrap();
        writeln!(output).unwrap();
        writeln!(output, "**Timestamp:** {}", row.timestamp.to_rfc3339()).unwrap();
        writeln!(output).unwrap();
        writeln!(
            output,
            "- Text: {} bytes ({} gzipped)",
            row.original_text_bytes, row.gzipped_text_bytes
        )
        .unwrap();
        writeln!(
            output,
            "- Artifacts: {} bytes primary + {} bytes index = {}",
            row.artifact_primary_bytes, row.artifact_index_bytes, row.total_artifact_bytes
        )
        .unwrap();
        writeln!(output, "- Chunks: {}", row.chunk_count).unwrap();
        writeln!(
            output,
            "- Verification: {} (accuracy {})",
            row.verification_outcome,
            if row.accuracy_passed { "passed" } else { "failed" }
        )
        .unwrap();
        writeln!(
            output,
            "- Timings: encode {:.4}s, full decode {:.4}s, sampled chunk {}",
            row.encode_seconds,
            row.decode_full_seconds,
            format_optional_seconds(row.decode_avg_sample_seconds)
        )
        .unwrap();
        if let Some(msg) = row.error_message.as_deref().filter(|m| !m.trim().is_empty()) {
            writeln!(output).unwrap();
            writeln!(output, "**Errors:**").unwrap();
            writeln!(output, "```").unwrap();
            for part in msg.split("; ") {
                writeln!(output, "{}", part).unwrap();
            }
            writeln!(output, "```").unwrap();
        }
        writeln!(output).unwrap();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidstore_bench_core::ChunkCount;

    fn row(name: &str, codec: &str, passed: bool, error: Option<&str>) -> MetricsRow {
        MetricsRow {
            original_filename: name.to_string(),
            encoder_codec: codec.to_string(),
            original_text_bytes: 1000,
            gzipped_text_bytes: 400,
            total_artifact_bytes: 2000,
            accuracy_passed: passed,
            encode_seconds: 1.0,
            chunk_count: ChunkCount::Known(3),
            error_message: error.map(str::to_string),
            ..MetricsRow::default()
        }
    }

    #[test]
    fn test_summary_tables() {
        let rows = vec![
            row("a.txt", "mp4v", true, None),
            row("b.txt", "mp4v", false, Some("DecodingError [decode_full]: a|b")),
            row("a.txt", "h265", true, None),
        ];
        let summary = generate_summary(&rows);
        assert!(summary.starts_with("# Benchmark Summary"));
        assert!(summary.contains("| a.txt | mp4v | native | 3 | pass | 5.00x |"));
        assert!(summary.contains("a\\|b"));
        assert!(summary.contains("| h265 | 1 | 1 | 0 |"));
        assert!(summary.contains("| mp4v | 2 | 1 | 1 |"));
        assert!(summary.contains("Total runs: 3"));
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = generate_summary(&[]);
        assert!(!summary.contains("By Codec"));
        assert!(summary.contains("Total runs: 0"));
    }

    #[test]
    fn test_long_errors_are_truncated() {
        let long = "x".repeat(200);
        let preview = error_preview(&row("a.txt", "mp4v", false, Some(&long)));
        assert_eq!(preview.chars().count(), ERROR_PREVIEW_CHARS);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_detailed_report_lists_each_error() {
        let rows = vec![row(
            "b.txt",
            "xvid",
            false,
            Some("EncodingError [encode]: boom; UnexpectedError [run]: later"),
        )];
        let report = generate_detailed_report(&rows);
        assert!(report.contains("## b.txt (xvid, native)"));
        assert!(report.contains("\nEncodingError [encode]: boom\n"));
        assert!(report.contains("\nUnexpectedError [run]: later\n"));
    }
}

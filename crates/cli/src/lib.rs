// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI for the vidstore benchmark harness.
//!
//! This crate provides the `vidstore-bench` command: single runs, sweeps
//! over codecs and engine modes, metrics log checks and reports, and
//! artifact inspection.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vidstore_bench_adapters::{build_engine, PlainTextExtractor};
use vidstore_bench_core::settings::{LogFormat, LogSettings, DEFAULT_SETTINGS_FILE};
use vidstore_bench_core::{
    Codec, EncodedArtifacts, EngineConfig, FailureKind, MetricsRecord, Settings, TextExtractor,
};
use vidstore_bench_harness::{
    check_log, inspect_artifacts, io, markdown, run_and_append, BenchmarkRunner, MetricsLog,
    MetricsRow, Orchestrator, RunRequest, SanityReport, SweepPlan,
};

/// vidstore-bench CLI.
#[derive(Parser, Debug)]
#[command(name = "vidstore-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (default: ./vidstore-bench.toml when present).
    #[arg(short, long, global = true, env = "VIDSTORE_BENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: pretty or json (overrides settings).
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Benchmark one document and append the result to the metrics log.
    Run {
        /// Document to benchmark.
        file: PathBuf,

        /// Codec to request from the engine.
        #[arg(long, default_value = "mp4v")]
        codec: Codec,

        /// Use the engine's alternate backend instead of the native path.
        #[arg(long)]
        alternate_backend: bool,

        /// Metrics log (default: <results_dir>/<results_file>).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Encoder options as a JSON object.
        #[arg(long, value_parser = parse_engine_config)]
        encoder_config: Option<EngineConfig>,

        /// Decoder options as a JSON object.
        #[arg(long, value_parser = parse_engine_config)]
        decoder_config: Option<EngineConfig>,

        /// Print the full record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Benchmark every document with every codec and engine mode.
    ///
    /// Results go to a new log, automated_benchmarks_<timestamp>.csv, in
    /// the results directory, with a markdown summary next to it.
    Sweep {
        /// Directory of documents (overrides settings).
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Directory for the log and summary (overrides settings).
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// Comma-separated codecs (overrides settings).
        #[arg(long, value_delimiter = ',')]
        codecs: Vec<Codec>,

        /// Comma-separated engine modes: native, alt (overrides settings).
        #[arg(long, value_delimiter = ',', value_parser = parse_engine_mode)]
        modes: Vec<bool>,

        /// Pause between runs in milliseconds (overrides settings).
        #[arg(long)]
        pause_ms: Option<u64>,

        /// Also write the full records, diagnostics included, as JSON.
        #[arg(long)]
        records_json: Option<PathBuf>,
    },

    /// Sanity-check a metrics log. Exits non-zero when issues are found.
    Check {
        /// Metrics log to check.
        log: PathBuf,
    },

    /// Show what the engine and the index say about a pair of artifacts.
    Inspect {
        /// Primary artifact.
        primary: PathBuf,

        /// Index artifact.
        index: PathBuf,

        /// Decoder options as a JSON object.
        #[arg(long, value_parser = parse_engine_config)]
        decoder_config: Option<EngineConfig>,
    },

    /// Render a metrics log as markdown or JSON.
    Report {
        /// Metrics log to render: a CSV log, or a `.json` file written by
        /// `sweep --records-json`.
        log: PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,

        /// One section per run instead of summary tables (markdown only).
        #[arg(long)]
        detailed: bool,

        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show harness status and configuration.
    Status {
        /// Show detailed status information.
        #[arg(short, long)]
        detailed: bool,
    },
}

/// Output format of `report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Markdown tables.
    Markdown,
    /// Pretty-printed JSON rows.
    Json,
}

fn parse_engine_config(s: &str) -> std::result::Result<EngineConfig, String> {
    serde_json::from_str(s).map_err(|e| format!("expected a JSON object: {}", e))
}

fn parse_engine_mode(s: &str) -> std::result::Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "native" | "false" | "0" => Ok(false),
        "alt" | "alternate" | "true" | "1" => Ok(true),
        other => Err(format!("unknown engine mode '{}' (expected native or alt)", other)),
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over settings.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(settings: &LogSettings, verbose: bool) -> Result<()> {
    let default_directive = if verbose { "debug" } else { settings.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

/// Run the CLI with the process arguments.
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if the command fails.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(format) = cli.log_format {
        settings.log.format = format;
    }
    init_tracing(&settings.log, cli.verbose)?;
    debug!(?settings, "Settings resolved");

    match cli.command {
        Commands::Run {
            file,
            codec,
            alternate_backend,
            output,
            encoder_config,
            decoder_config,
            json,
        } => {
            let mut request = RunRequest::for_path(file, codec, alternate_backend);
            if let Some(config) = encoder_config {
                request = request.with_encoder_config(config);
            }
            if let Some(config) = decoder_config {
                request = request.with_decoder_config(config);
            }
            let log = MetricsLog::new(output.unwrap_or_else(|| settings.paths.results_log()));
            run_single(&settings, request, &log, json)
        }
        Commands::Sweep {
            input_dir,
            results_dir,
            codecs,
            modes,
            pause_ms,
            records_json,
        } => {
            if let Some(dir) = input_dir {
                settings.paths.input_dir = dir;
            }
            if let Some(dir) = results_dir {
                settings.paths.results_dir = dir;
            }
            if !codecs.is_empty() {
                settings.sweep.codecs = codecs;
            }
            if !modes.is_empty() {
                settings.sweep.engine_modes = modes;
            }
            if let Some(pause) = pause_ms {
                settings.sweep.pause_between_runs_ms = pause;
            }
            run_sweep(&settings, cli.verbose, records_json.as_deref())
        }
        Commands::Check { log } => {
            let report = check_log(&log)
                .with_context(|| format!("failed to read {}", log.display()))?;
            print_sanity(&report);
            if !report.passed() {
                bail!("sanity checks found issues in {}", log.display());
            }
            Ok(())
        }
        Commands::Inspect {
            primary,
            index,
            decoder_config,
        } => {
            let engine = build_engine(&settings)?;
            let artifacts = EncodedArtifacts { primary, index };
            let report = inspect_artifacts(engine.as_ref(), &artifacts, decoder_config.as_ref());
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Report {
            log,
            format,
            detailed,
            output,
        } => {
            let rows = read_report_rows(&log)
                .with_context(|| format!("failed to read {}", log.display()))?;
            let rendered = match format {
                ReportFormat::Markdown if detailed => markdown::generate_detailed_report(&rows),
                ReportFormat::Markdown => markdown::generate_summary(&rows),
                ReportFormat::Json => serde_json::to_string_pretty(&rows)?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}", path.display());
                }
                None => println!("{}", rendered),
            }
            Ok(())
        }
        Commands::Status { detailed } => {
            print_status(&settings, cli.config.as_deref(), detailed)
        }
    }
}

fn runner(settings: &Settings) -> Result<BenchmarkRunner> {
    let engine = build_engine(settings)?;
    Ok(BenchmarkRunner::new(
        Box::new(PlainTextExtractor::default()),
        engine,
    ))
}

fn run_single(
    settings: &Settings,
    request: RunRequest,
    log: &MetricsLog,
    json: bool,
) -> Result<()> {
    let runner = runner(settings)?;
    let record = run_and_append(&runner, request, log)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    println!("Appended to {}", log.path().display());
    Ok(())
}

fn read_report_rows(log: &Path) -> vidstore_bench_core::Result<Vec<MetricsRow>> {
    let is_json = log
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        Ok(io::rows_from_records(&io::read_records_json(log)?))
    } else {
        io::read_rows(log)
    }
}

fn run_sweep(settings: &Settings, verbose: bool, records_json: Option<&Path>) -> Result<()> {
    let runner = runner(settings)?;
    let extensions = runner.extractor().supported_extensions();
    let plan = SweepPlan::from_settings(settings, &extensions)?;

    println!(
        "Sweeping {} document(s) x {} codec(s) x {} mode(s) = {} runs",
        plan.files.len(),
        plan.codecs.len(),
        plan.engine_modes.len(),
        plan.total_runs()
    );

    let outcome = Orchestrator::from_settings(&runner, settings).run(&plan)?;
    let Some(log_path) = outcome.log_path.as_deref() else {
        println!(
            "{} no documents with extensions {:?} in {}",
            "Nothing to do:".yellow(),
            extensions,
            settings.paths.input_dir.display()
        );
        return Ok(());
    };

    let clean = outcome.records.iter().filter(|r| r.is_clean()).count();
    println!(
        "Completed {} runs ({} clean, {} with diagnostics)",
        outcome.records.len(),
        clean,
        outcome.records.len() - clean
    );
    if verbose {
        for record in &outcome.records {
            print_record(record);
        }
    }
    println!("Results written to {}", log_path.display());
    if let Some(summary) = &outcome.summary_path {
        println!("Summary written to {}", summary.display());
    }
    if let Some(path) = records_json {
        io::write_records_json(&outcome.records, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Records written to {}", path.display());
    }
    if let Some(report) = &outcome.sanity {
        print_sanity(report);
    }
    Ok(())
}

fn print_record(record: &MetricsRecord) {
    let only_mismatch = !record.is_clean()
        && record
            .diagnostics
            .iter()
            .all(|d| d.kind == FailureKind::VerificationMismatch);
    let label = if record.is_clean() && record.accuracy_passed() {
        "OK".green().bold()
    } else if only_mismatch {
        "MISMATCH".yellow().bold()
    } else {
        "FAIL".red().bold()
    };
    let mode = if record.engine_mode_flag { "alt" } else { "native" };

    println!(
        "{} {} ({}, {})",
        label, record.original_filename, record.encoder_codec, mode
    );
    println!(
        "  text: {} bytes, gzipped {} bytes",
        record.original_text_bytes, record.gzipped_text_bytes
    );
    println!(
        "  artifacts: {} bytes ({} primary + {} index)",
        record.total_artifact_bytes(),
        record.artifact_primary_bytes,
        record.artifact_index_bytes
    );
    if let Some(ratio) = record.storage_ratio_vs_gzip() {
        println!("  artifacts / gzip: {:.2}x", ratio);
    }
    println!(
        "  chunks: {}, verification: {}",
        record.chunk_count, record.verification
    );
    println!(
        "  encode {:.4}s, full decode {:.4}s, sampled chunk {}",
        record.encode_seconds,
        record.decode_full_seconds,
        record
            .decode_avg_sample_seconds
            .map(|s| format!("{:.4}s", s))
            .unwrap_or_else(|| "n/a".to_string())
    );
    for diagnostic in &record.diagnostics {
        println!("  {} {}", "-".dimmed(), diagnostic);
    }
}

fn print_sanity(report: &SanityReport) {
    let verdict = if report.passed() {
        "PASSED".green().bold()
    } else {
        "ISSUES FOUND".red().bold()
    };
    println!("{} {}", "Sanity check:".bold(), verdict);
    println!("{}", report);
}

fn print_status(settings: &Settings, config: Option<&Path>, detailed: bool) -> Result<()> {
    println!("{}", "vidstore benchmark harness".bold());
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    let source = match config {
        Some(path) => path.display().to_string(),
        None if Path::new(DEFAULT_SETTINGS_FILE).is_file() => DEFAULT_SETTINGS_FILE.to_string(),
        None => "built-in defaults".to_string(),
    };
    println!("Settings: {}", source);
    println!("Engine: {}", settings.engine.kind);

    let dirs = [
        ("input", &settings.paths.input_dir),
        ("artifacts", &settings.paths.artifact_dir),
        ("results", &settings.paths.results_dir),
    ];
    println!("\nDirectories:");
    for (label, dir) in dirs {
        let state = if dir.is_dir() {
            "present".green()
        } else {
            "missing".yellow()
        };
        println!("  - {:<10} {} ({})", label, dir.display(), state);
    }
    println!("Metrics log: {}", settings.paths.results_log().display());

    if detailed {
        let codecs: Vec<_> = settings.sweep.codecs.iter().map(Codec::as_str).collect();
        println!("\nSweep:");
        println!("  codecs: {}", codecs.join(", "));
        println!("  engine modes: {:?}", settings.sweep.engine_modes);
        println!("  pause between runs: {} ms", settings.sweep.pause_between_runs_ms);

        println!("\nResolved settings:");
        println!("{}", serde_json::to_string_pretty(settings)?);

        if let Ok(entries) = std::fs::read_dir(&settings.paths.results_dir) {
            let mut logs: Vec<_> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().map(|ext| ext == "csv").unwrap_or(false))
                .collect();
            logs.sort();
            println!("\nMetrics logs:");
            for log in logs {
                println!("  - {}", log.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "vidstore-bench",
            "run",
            "doc.txt",
            "--codec",
            "HEVC",
            "--alternate-backend",
            "--encoder-config",
            r#"{"chunk_size": 200}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                file,
                codec,
                alternate_backend,
                encoder_config,
                decoder_config,
                ..
            } => {
                assert_eq!(file, PathBuf::from("doc.txt"));
                assert_eq!(codec, Codec::H265);
                assert!(alternate_backend);
                assert_eq!(encoder_config.unwrap()["chunk_size"], 200);
                assert!(decoder_config.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_sweep_lists() {
        let cli = Cli::try_parse_from([
            "vidstore-bench",
            "--log-format",
            "json",
            "sweep",
            "--codecs",
            "mp4v,xvid",
            "--modes",
            "native,alt",
            "--pause-ms",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        match cli.command {
            Commands::Sweep {
                codecs,
                modes,
                pause_ms,
                ..
            } => {
                assert_eq!(codecs, vec![Codec::Mp4v, Codec::Xvid]);
                assert_eq!(modes, vec![false, true]);
                assert_eq!(pause_ms, Some(0));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(
            Cli::try_parse_from(["vidstore-bench", "run", "doc.txt", "--codec", "vp9"]).is_err()
        );
        assert!(Cli::try_parse_from(["vidstore-bench", "sweep", "--modes", "fast"]).is_err());
        assert!(Cli::try_parse_from([
            "vidstore-bench",
            "run",
            "doc.txt",
            "--encoder-config",
            "[1, 2]"
        ])
        .is_err());
    }

    #[test]
    fn test_parse_engine_mode_aliases() {
        assert_eq!(parse_engine_mode("Native"), Ok(false));
        assert_eq!(parse_engine_mode("alternate"), Ok(true));
        assert_eq!(parse_engine_mode("1"), Ok(true));
        assert!(parse_engine_mode("").is_err());
    }

    #[test]
    fn test_report_defaults_to_markdown() {
        let cli = Cli::try_parse_from(["vidstore-bench", "report", "log.csv"]).unwrap();
        match cli.command {
            Commands::Report {
                format, detailed, ..
            } => {
                assert_eq!(format, ReportFormat::Markdown);
                assert!(!detailed);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_single_appends_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "cli driven benchmark document").unwrap();
        let settings = Settings::rooted_at(dir.path());
        let log = MetricsLog::new(dir.path().join("out.csv"));

        run_single(&settings, RunRequest::for_path(&doc, Codec::H264, false), &log, false).unwrap();
        run_single(&settings, RunRequest::for_path(&doc, Codec::H264, true), &log, true).unwrap();

        let rows = log.read_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.has_error()));
    }

    #[test]
    fn test_sweep_records_json_feeds_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::rooted_at(dir.path());
        settings.sweep.pause_between_runs_ms = 0;
        settings.sweep.codecs = vec![Codec::Mp4v, Codec::H264];
        settings.sweep.engine_modes = vec![false];
        std::fs::create_dir_all(&settings.paths.input_dir).unwrap();
        std::fs::write(settings.paths.input_dir.join("a.txt"), "first document").unwrap();
        std::fs::write(settings.paths.input_dir.join("b.txt"), " ").unwrap();
        let json = dir.path().join("records.json");

        run_sweep(&settings, false, Some(&json)).unwrap();

        let rows = read_report_rows(&json).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.iter().filter(|r| r.has_error()).count(), 2);
        assert!(rows.iter().any(|r| r.encoder_codec == "h264"));
    }

    #[test]
    fn test_second_tracing_init_is_an_error() {
        let settings = LogSettings::default();
        let _ = init_tracing(&settings, false);
        assert!(init_tracing(&settings, false).is_err());
    }
}

// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Experiment orchestration: run every document with every codec and
//! engine mode, then persist and sanity-check the consolidated results.

use crate::io::{self, MetricsLog};
use crate::runner::{panic_message, Benchmark, RunRequest};
use crate::sanity::{self, SanityReport};
use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use vidstore_bench_core::{Codec, Error, MetricsRecord, Result, Settings};

/// Prefix of the per-sweep log file names.
pub const SWEEP_LOG_PREFIX: &str = "automated_benchmarks";

/// Documents and parameters of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    /// Documents, in run order.
    pub files: Vec<PathBuf>,
    /// Codecs tried per document.
    pub codecs: Vec<Codec>,
    /// Engine modes tried per codec.
    pub engine_modes: Vec<bool>,
}

impl SweepPlan {
    /// Plan over the files of `input_dir` whose extension is in
    /// `extensions`, sorted by path. Subdirectories are not descended.
    pub fn discover(
        input_dir: &Path,
        extensions: &[String],
        codecs: Vec<Codec>,
        engine_modes: Vec<bool>,
    ) -> Result<Self> {
        if !input_dir.is_dir() {
            return Err(Error::invalid_input(format!(
                "input directory not found: {}",
                input_dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(input_dir)? {
            let path = entry?.path();
            let supported = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .map(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(&ext)))
                .unwrap_or(false);
            if path.is_file() && supported {
                files.push(path);
            }
        }
        files.sort();

        Ok(Self {
            files,
            codecs,
            engine_modes,
        })
    }

    /// Plan from the sweep section of `settings`.
    pub fn from_settings(settings: &Settings, extensions: &[String]) -> Result<Self> {
        Self::discover(
            &settings.paths.input_dir,
            extensions,
            settings.sweep.codecs.clone(),
            settings.sweep.engine_modes.clone(),
        )
    }

    /// Number of runs the plan expands to.
    pub fn total_runs(&self) -> usize {
        self.files.len() * self.codecs.len() * self.engine_modes.len()
    }

    /// Every (document, codec, mode) combination, documents outermost.
    pub fn combinations(&self) -> impl Iterator<Item = (&Path, Codec, bool)> + '_ {
        self.files.iter().flat_map(move |file| {
            self.codecs.iter().flat_map(move |&codec| {
                self.engine_modes
                    .iter()
                    .map(move |&mode| (file.as_path(), codec, mode))
            })
        })
    }
}

/// What a sweep produced.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// One record per run, in run order.
    pub records: Vec<MetricsRecord>,
    /// The consolidated log; `None` when nothing ran.
    pub log_path: Option<PathBuf>,
    /// Markdown summary next to the log.
    pub summary_path: Option<PathBuf>,
    /// Sanity check of the log.
    pub sanity: Option<SanityReport>,
}

/// Runs a [`SweepPlan`] through a [`Benchmark`].
pub struct Orchestrator<'a> {
    benchmark: &'a dyn Benchmark,
    results_dir: PathBuf,
    pause: Duration,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator writing into `results_dir`.
    pub fn new(benchmark: &'a dyn Benchmark, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            benchmark,
            results_dir: results_dir.into(),
            pause: Duration::ZERO,
        }
    }

    /// Orchestrator configured from `settings`.
    pub fn from_settings(benchmark: &'a dyn Benchmark, settings: &Settings) -> Self {
        Self::new(benchmark, settings.paths.results_dir.clone())
            .with_pause(Duration::from_millis(settings.sweep.pause_between_runs_ms))
    }

    /// Pause between consecutive runs.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Execute the plan. A run that panics past the benchmark still yields
    /// a record. Only persistence of the consolidated log can fail the sweep.
    pub fn run(&self, plan: &SweepPlan) -> Result<SweepOutcome> {
        let total = plan.total_runs();
        if total == 0 {
            warn!(
                files = plan.files.len(),
                codecs = plan.codecs.len(),
                modes = plan.engine_modes.len(),
                "Nothing to sweep"
            );
            return Ok(SweepOutcome {
                records: Vec::new(),
                log_path: None,
                summary_path: None,
                sanity: None,
            });
        }

        info!(runs = total, files = plan.files.len(), "Sweep started");
        let mut records = Vec::with_capacity(total);
        for (n, (file, codec, mode)) in plan.combinations().enumerate() {
            if n > 0 && !self.pause.is_zero() {
                thread::sleep(self.pause);
            }
            info!(
                run = n + 1,
                of = total,
                file = %file.display(),
                %codec,
                alternate_backend = mode,
                "Starting run"
            );
            records.push(self.run_one(file, codec, mode));
        }

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let log_path = self
            .results_dir
            .join(format!("{}_{}.csv", SWEEP_LOG_PREFIX, stamp));
        MetricsLog::new(&log_path).append(&records)?;

        let summary_path = log_path.with_extension("md");
        io::write_summary(&io::rows_from_records(&records), &summary_path)?;

        let report = sanity::check_log(&log_path)?;
        if report.passed() {
            info!(log = %log_path.display(), "Sweep finished, sanity checks passed");
        } else {
            warn!(log = %log_path.display(), "Sweep finished, sanity checks found issues");
        }

        Ok(SweepOutcome {
            records,
            log_path: Some(log_path),
            summary_path: Some(summary_path),
            sanity: Some(report),
        })
    }

    fn run_one(&self, file: &Path, codec: Codec, mode: bool) -> MetricsRecord {
        let request = RunRequest::for_path(file, codec, mode);
        let filename = request.filename.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| self.benchmark.run(request))) {
            Ok(record) => record,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(file = %filename, %codec, error = %message, "Run failed");
                MetricsRecord::failed_run(filename, codec, mode, format!("Run failed: {}", message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;

    /// Records every request; panics on documents named `panic.txt`.
    struct ScriptedBenchmark {
        seen: RefCell<Vec<(String, Codec, bool)>>,
    }

    impl Benchmark for ScriptedBenchmark {
        fn run(&self, request: RunRequest) -> MetricsRecord {
            self.seen.borrow_mut().push((
                request.filename.clone(),
                request.codec,
                request.alternate_backend,
            ));
            if request.filename == "panic.txt" {
                panic!("engine crashed hard");
            }
            let mut record =
                MetricsRecord::new(&request.filename, request.codec, request.alternate_backend);
            record.original_text_bytes = 10;
            record
        }
    }

    fn scripted() -> ScriptedBenchmark {
        ScriptedBenchmark {
            seen: RefCell::new(Vec::new()),
        }
    }

    fn input_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), "text").unwrap();
        }
        dir
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = input_dir(&["b.txt", "a.TXT", "c.pdf", "notes.md"]);
        fs::create_dir(dir.path().join("sub.txt")).unwrap();
        let plan = SweepPlan::discover(
            dir.path(),
            &["txt".to_string()],
            vec![Codec::Mp4v],
            vec![false],
        )
        .unwrap();
        let names: Vec<_> = plan
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.txt"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let err = SweepPlan::discover(Path::new("/no/such/dir"), &[], vec![], vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_combination_order() {
        let plan = SweepPlan {
            files: vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")],
            codecs: vec![Codec::Mp4v, Codec::H265],
            engine_modes: vec![false, true],
        };
        assert_eq!(plan.total_runs(), 8);
        let combos: Vec<_> = plan.combinations().collect();
        assert_eq!(combos[0], (Path::new("a.txt"), Codec::Mp4v, false));
        assert_eq!(combos[1], (Path::new("a.txt"), Codec::Mp4v, true));
        assert_eq!(combos[2], (Path::new("a.txt"), Codec::H265, false));
        assert_eq!(combos[4], (Path::new("b.txt"), Codec::Mp4v, false));
    }

    #[test]
    fn test_sweep_writes_log_and_survives_panics() {
        let inputs = input_dir(&["ok.txt", "panic.txt"]);
        let results = tempfile::tempdir().unwrap();
        let plan = SweepPlan::discover(
            inputs.path(),
            &["txt".to_string()],
            vec![Codec::Mp4v, Codec::H264],
            vec![false, true],
        )
        .unwrap();

        let benchmark = scripted();
        let outcome = Orchestrator::new(&benchmark, results.path()).run(&plan).unwrap();

        assert_eq!(benchmark.seen.borrow().len(), 8);
        assert_eq!(outcome.records.len(), 8);
        let failed: Vec<_> = outcome
            .records
            .iter()
            .filter(|r| r.original_filename == "panic.txt")
            .collect();
        assert_eq!(failed.len(), 4);
        for record in &failed {
            let message = record.error_message().unwrap();
            assert!(message.contains("Run failed: engine crashed hard"), "{}", message);
        }

        let log_path = outcome.log_path.unwrap();
        let name = log_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("automated_benchmarks_") && name.ends_with(".csv"));
        assert_eq!(io::read_rows(&log_path).unwrap().len(), 8);
        assert!(outcome.summary_path.unwrap().is_file());

        let sanity = outcome.sanity.unwrap();
        assert_eq!(sanity.error_rows, 4);
        assert!(sanity.passed(), "{}", sanity);
    }

    #[test]
    fn test_empty_plan_writes_nothing() {
        let inputs = input_dir(&[]);
        let results = tempfile::tempdir().unwrap();
        let plan = SweepPlan::discover(
            inputs.path(),
            &["txt".to_string()],
            vec![Codec::Mp4v],
            vec![false],
        )
        .unwrap();
        let benchmark = scripted();
        let outcome = Orchestrator::new(&benchmark, results.path()).run(&plan).unwrap();
        assert!(outcome.records.is_empty());
        assert!(outcome.log_path.is_none());
        assert!(fs::read_dir(results.path()).unwrap().next().is_none());
    }
}

// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Harness settings.
//!
//! Settings are layered, later layers overriding earlier ones:
//!
//! 1. built-in defaults ([`Settings::default`]);
//! 2. a TOML file (`vidstore-bench.toml` in the working directory when
//!    present, or an explicit path which must exist);
//! 3. environment variables prefixed `VIDSTORE_BENCH__`, nested with `__`
//!    (e.g. `VIDSTORE_BENCH__PATHS__RESULTS_DIR`). A `.env` file is loaded
//!    first if one exists.
//!
//! Loading never touches the filesystem beyond reading these sources.
//! Directories are created on first use by the engines and the metrics log.

use crate::codec::Codec;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "vidstore-bench.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "VIDSTORE_BENCH";

/// Top-level harness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathSettings,
    /// Sweep parameters.
    #[serde(default)]
    pub sweep: SweepSettings,
    /// Engine selection and tuning.
    #[serde(default)]
    pub engine: EngineSettings,
    /// Logging.
    #[serde(default)]
    pub log: LogSettings,
}

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Documents picked up by a sweep.
    pub input_dir: PathBuf,
    /// Where engines write primary artifacts and indexes.
    pub artifact_dir: PathBuf,
    /// Where metrics logs and reports go.
    pub results_dir: PathBuf,
    /// File name of the default metrics log inside `results_dir`.
    pub results_file: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/input_docs"),
            artifact_dir: PathBuf::from("data/artifacts"),
            results_dir: PathBuf::from("data/results"),
            results_file: "benchmarks.csv".to_string(),
        }
    }
}

impl PathSettings {
    /// Place every directory under `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            input_dir: root.join("input_docs"),
            artifact_dir: root.join("artifacts"),
            results_dir: root.join("results"),
            ..Self::default()
        }
    }

    /// Default metrics log location.
    pub fn results_log(&self) -> PathBuf {
        self.results_dir.join(&self.results_file)
    }
}

/// Cross-product swept by the experiment orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Codecs to run every document with.
    pub codecs: Vec<Codec>,
    /// Engine modes (`false` = native, `true` = alternate backend).
    pub engine_modes: Vec<bool>,
    /// Pause between consecutive runs, in milliseconds.
    pub pause_between_runs_ms: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            codecs: vec![Codec::Mp4v, Codec::H265, Codec::H264],
            engine_modes: vec![false, true],
            pause_between_runs_ms: 1000,
        }
    }
}

/// Which engine implementation to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// The built-in reference engine.
    #[default]
    Local,
    /// An external engine executable.
    Process,
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(EngineKind::Local),
            "process" => Ok(EngineKind::Process),
            other => Err(Error::invalid_input(format!("unknown engine kind '{}'", other))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Local => f.write_str("local"),
            EngineKind::Process => f.write_str("process"),
        }
    }
}

/// Engine selection and tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Engine implementation.
    pub kind: EngineKind,
    /// Characters per chunk for the local engine.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks for the local engine.
    pub overlap: usize,
    /// Executable for the process engine.
    #[serde(default)]
    pub program: Option<PathBuf>,
    /// Arguments placed before the subcommand for the process engine.
    #[serde(default)]
    pub program_args: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            kind: EngineKind::Local,
            chunk_size: 500,
            overlap: 50,
            program: None,
            program_args: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::invalid_input(format!("unknown log format '{}'", other))),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Load layered settings. `path`, when given, must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "Loaded environment file");
        }

        let defaults = ::config::Config::try_from(&Settings::default())?;
        let mut builder = ::config::Config::builder().add_source(defaults);

        builder = match path {
            Some(path) => builder.add_source(::config::File::from(path).required(true)),
            None => builder
                .add_source(::config::File::with_name(DEFAULT_SETTINGS_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sweep.codecs")
                    .with_list_parse_key("sweep.engine_modes")
                    .with_list_parse_key("engine.program_args"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!(
            file = ?path,
            engine = %settings.engine.kind,
            results_dir = %settings.paths.results_dir.display(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Defaults with every directory placed under `root`.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        Self {
            paths: PathSettings::under(root),
            ..Self::default()
        }
    }

    /// Reject settings that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.engine.chunk_size == 0 {
            return Err(Error::config("engine.chunk_size must be greater than zero"));
        }
        if self.engine.overlap >= self.engine.chunk_size {
            return Err(Error::config(format!(
                "engine.overlap ({}) must be smaller than engine.chunk_size ({})",
                self.engine.overlap, self.engine.chunk_size
            )));
        }
        if self.engine.kind == EngineKind::Process && self.engine.program.is_none() {
            return Err(Error::config(
                "engine.program is required when engine.kind = \"process\"",
            ));
        }
        if self.sweep.codecs.is_empty() {
            return Err(Error::config("sweep.codecs must not be empty"));
        }
        if self.sweep.engine_modes.is_empty() {
            return Err(Error::config("sweep.engine_modes must not be empty"));
        }
        if self.paths.results_file.trim().is_empty() {
            return Err(Error::config("paths.results_file must not be empty"));
        }
        Ok(())
    }
}

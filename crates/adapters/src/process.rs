// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adapter for engines shipped as an external executable.
//!
//! The executable is invoked once per operation with one of three
//! subcommands, after any configured leading arguments:
//!
//! ```text
//! <program> [args..] encode --input <text file> --output <primary> --index <index>
//!                           --codec <codec> [--alternate-backend] [--config <json>]
//! <program> [args..] chunk  --video <primary> --index <index> --id <n> [--config <json>]
//! <program> [args..] stats  --video <primary> --index <index> [--config <json>]
//! ```
//!
//! `chunk` prints the chunk text on stdout and exits with
//! [`CHUNK_NOT_FOUND_EXIT_CODE`] for an unknown id; `stats` prints a JSON
//! object. Any other non-zero exit is an engine error carrying stderr.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info, warn};
use vidstore_bench_core::settings::Settings;
use vidstore_bench_core::{
    ChunkDecoder, EncodeRequest, EncodedArtifacts, Engine, EngineConfig, EngineError, EngineStats,
};

/// Exit code the `chunk` subcommand uses for an out-of-range id.
pub const CHUNK_NOT_FOUND_EXIT_CODE: i32 = 3;

const STDERR_EXCERPT_CHARS: usize = 500;

/// How to launch the engine executable.
#[derive(Debug, Clone)]
struct Launcher {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl Launcher {
    fn run(&self, args: Vec<OsString>) -> Result<Output, EngineError> {
        debug!(program = %self.program.display(), ?args, "Invoking engine executable");
        Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .output()
            .map_err(|e| {
                EngineError::Backend(format!(
                    "failed to launch {}: {}",
                    self.program.display(),
                    e
                ))
            })
    }
}

fn stderr_excerpt(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect()
}

fn config_args(config: Option<&EngineConfig>) -> Result<Vec<OsString>, EngineError> {
    match config {
        Some(config) if !config.is_empty() => Ok(vec![
            "--config".into(),
            serde_json::to_string(config)?.into(),
        ]),
        _ => Ok(Vec::new()),
    }
}

/// Arguments of the `encode` subcommand.
pub fn encode_args(
    input: &Path,
    artifacts: &EncodedArtifacts,
    request: &EncodeRequest<'_>,
) -> Result<Vec<OsString>, EngineError> {
    let mut args: Vec<OsString> = vec![
        "encode".into(),
        "--input".into(),
        input.into(),
        "--output".into(),
        artifacts.primary.clone().into(),
        "--index".into(),
        artifacts.index.clone().into(),
        "--codec".into(),
        request.codec.as_str().into(),
    ];
    if request.alternate_backend {
        args.push("--alternate-backend".into());
    }
    args.extend(config_args(request.config)?);
    Ok(args)
}

/// Engine driven through an external executable.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    launcher: Launcher,
    output_dir: PathBuf,
}

impl ProcessEngine {
    /// Engine running `program` with `leading_args`, writing into `output_dir`.
    pub fn new(
        program: impl Into<PathBuf>,
        leading_args: Vec<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher: Launcher {
                program: program.into(),
                leading_args,
            },
            output_dir: output_dir.into(),
        }
    }

    /// Engine configured from harness settings.
    pub fn from_settings(settings: &Settings) -> vidstore_bench_core::Result<Self> {
        let program = settings.engine.program.clone().ok_or_else(|| {
            vidstore_bench_core::Error::config("engine.program is not set")
        })?;
        Ok(Self::new(
            program,
            settings.engine.program_args.clone(),
            settings.paths.artifact_dir.clone(),
        ))
    }
}

impl Engine for ProcessEngine {
    fn name(&self) -> &str {
        "process"
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<EncodedArtifacts, EngineError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let artifacts = EncodedArtifacts {
            primary: self.output_dir.join(format!(
                "{}.{}",
                request.output_stem,
                request.codec.container_extension()
            )),
            index: self
                .output_dir
                .join(format!("{}_index.json", request.output_stem)),
        };

        let input = self
            .output_dir
            .join(format!("{}.input.txt", request.output_stem));
        std::fs::write(&input, request.text)?;

        let result = self
            .launcher
            .run(encode_args(&input, &artifacts, request)?);
        if let Err(err) = std::fs::remove_file(&input) {
            warn!(path = %input.display(), error = %err, "Failed to remove staged input");
        }
        let output = result?;

        if !output.status.success() {
            return Err(EngineError::Encoding(format!(
                "engine exited with {}: {}",
                output.status,
                stderr_excerpt(&output)
            )));
        }

        info!(
            primary = %artifacts.primary.display(),
            index = %artifacts.index.display(),
            "External engine encode complete"
        );
        Ok(artifacts)
    }

    fn open(
        &self,
        artifacts: &EncodedArtifacts,
        config: Option<&EngineConfig>,
    ) -> Result<Box<dyn ChunkDecoder>, EngineError> {
        for path in [&artifacts.primary, &artifacts.index] {
            if !path.is_file() {
                return Err(EngineError::Decoding(format!(
                    "artifact not found: {}",
                    path.display()
                )));
            }
        }
        Ok(Box::new(ProcessDecoder {
            launcher: self.launcher.clone(),
            artifacts: artifacts.clone(),
            config_args: config_args(config)?,
        }))
    }
}

/// Decoder invoking the engine executable per call.
#[derive(Debug)]
pub struct ProcessDecoder {
    launcher: Launcher,
    artifacts: EncodedArtifacts,
    config_args: Vec<OsString>,
}

impl ProcessDecoder {
    fn args(&self, subcommand: &str, extra: &[OsString]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            subcommand.into(),
            "--video".into(),
            self.artifacts.primary.clone().into(),
            "--index".into(),
            self.artifacts.index.clone().into(),
        ];
        args.extend_from_slice(extra);
        args.extend(self.config_args.iter().cloned());
        args
    }
}

impl ChunkDecoder for ProcessDecoder {
    fn get_chunk(&self, id: u64) -> Result<Option<String>, EngineError> {
        let output = self
            .launcher
            .run(self.args("chunk", &["--id".into(), id.to_string().into()]))?;

        if output.status.code() == Some(CHUNK_NOT_FOUND_EXIT_CODE) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(EngineError::Decoding(format!(
                "chunk {} failed with {}: {}",
                id,
                output.status,
                stderr_excerpt(&output)
            )));
        }
        String::from_utf8(output.stdout)
            .map(Some)
            .map_err(|e| EngineError::Decoding(format!("chunk {} is not UTF-8: {}", id, e)))
    }

    fn stats(&self) -> Result<EngineStats, EngineError> {
        let output = self.launcher.run(self.args("stats", &[]))?;
        if !output.status.success() {
            return Err(EngineError::Decoding(format!(
                "stats failed with {}: {}",
                output.status,
                stderr_excerpt(&output)
            )));
        }
        match serde_json::from_slice(&output.stdout)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(EngineError::Decoding(format!(
                "stats output is not a JSON object: {}",
                other
            ))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use vidstore_bench_core::Codec;

    /// A tiny engine written in POSIX sh: the primary artifact is a copy of
    /// the input, and the whole text is chunk 0.
    const FAKE_ENGINE: &str = r#"
cmd="$1"; shift
while [ $# -gt 0 ]; do
  case "$1" in
    --input) input="$2"; shift 2 ;;
    --output|--video) video="$2"; shift 2 ;;
    --index) index="$2"; shift 2 ;;
    --id) id="$2"; shift 2 ;;
    --codec) codec="$2"; shift 2 ;;
    --config) shift 2 ;;
    *) shift ;;
  esac
done
case "$cmd" in
  encode)
    [ "$codec" = "xvid" ] && { echo "codec unsupported" >&2; exit 1; }
    cp "$input" "$video" && printf '{"metadata":[{"text":"x"}]}' > "$index" ;;
  chunk)
    [ "$id" = "0" ] || exit 3
    cat "$video" ;;
  stats)
    printf '{"index_summary":{"total_chunks":1}}' ;;
  *) exit 64 ;;
esac
"#;

    fn engine(dir: &Path) -> ProcessEngine {
        let script = dir.join("fake_engine.sh");
        std::fs::write(&script, FAKE_ENGINE).unwrap();
        ProcessEngine::new(
            "/bin/sh",
            vec![script.to_string_lossy().into_owned()],
            dir.join("artifacts"),
        )
    }

    fn request(codec: Codec) -> EncodeRequest<'static> {
        EncodeRequest {
            text: "external engine text",
            output_stem: "ext",
            codec,
            alternate_backend: true,
            config: None,
        }
    }

    #[test]
    fn test_encode_args_include_mode_and_config() {
        let artifacts = EncodedArtifacts {
            primary: PathBuf::from("/out/a.mp4"),
            index: PathBuf::from("/out/a_index.json"),
        };
        let mut config = EngineConfig::new();
        config.insert("fps".into(), serde_json::json!(30));
        let mut req = request(Codec::H264);
        req.config = Some(&config);

        let args = encode_args(Path::new("/out/a.input.txt"), &artifacts, &req).unwrap();
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "encode");
        assert!(args.contains(&"--alternate-backend".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--codec" && w[1] == "h264"));
        assert!(args.windows(2).any(|w| w[0] == "--config" && w[1] == r#"{"fps":30}"#));
    }

    #[test]
    fn test_round_trip_through_executable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let artifacts = engine.encode(&request(Codec::Mp4v)).unwrap();
        assert!(artifacts.primary.is_file());
        assert!(!dir.path().join("artifacts/ext.input.txt").exists());

        let decoder = engine.open(&artifacts, None).unwrap();
        assert_eq!(
            decoder.get_chunk(0).unwrap().as_deref(),
            Some("external engine text")
        );
        assert_eq!(decoder.get_chunk(1).unwrap(), None);
        assert_eq!(decoder.stats().unwrap()["index_summary"]["total_chunks"], 1);
    }

    #[test]
    fn test_engine_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        match engine.encode(&request(Codec::Xvid)) {
            Err(EngineError::Encoding(msg)) => assert!(msg.contains("codec unsupported")),
            other => panic!("expected encoding error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::new(dir.path().join("no-such-engine"), Vec::new(), dir.path());
        assert!(matches!(
            engine.encode(&request(Codec::Mp4v)),
            Err(EngineError::Backend(_))
        ));
    }
}

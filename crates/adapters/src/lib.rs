// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Collaborator adapters for the vidstore benchmark harness.
//!
//! - [`extract`] - plain-text document extraction
//! - [`local`] - the built-in reference engine
//! - [`process`] - engines shipped as an external executable
//!
//! # Example
//!
//! ```no_run
//! use vidstore_bench_adapters::build_engine;
//! use vidstore_bench_core::Settings;
//!
//! let settings = Settings::load(None)?;
//! let engine = build_engine(&settings)?;
//! println!("benchmarking the {} engine", engine.name());
//! # Ok::<(), vidstore_bench_core::Error>(())
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod extract;
pub mod local;
pub mod process;

pub use extract::PlainTextExtractor;
pub use local::LocalEngine;
pub use process::ProcessEngine;

use vidstore_bench_core::settings::EngineKind;
use vidstore_bench_core::{Engine, Result, Settings};

/// Build the engine selected by `settings.engine.kind`.
pub fn build_engine(settings: &Settings) -> Result<Box<dyn Engine>> {
    match settings.engine.kind {
        EngineKind::Local => Ok(Box::new(LocalEngine::from_settings(settings))),
        EngineKind::Process => Ok(Box::new(ProcessEngine::from_settings(settings)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_engine_defaults_to_local() {
        let engine = build_engine(&Settings::default()).unwrap();
        assert_eq!(engine.name(), "local");
    }

    #[test]
    fn test_build_process_engine_requires_program() {
        let mut settings = Settings::default();
        settings.engine.kind = EngineKind::Process;
        assert!(build_engine(&settings).is_err());

        settings.engine.program = Some(PathBuf::from("/opt/engine/bin/encode"));
        assert_eq!(build_engine(&settings).unwrap().name(), "process");
    }
}

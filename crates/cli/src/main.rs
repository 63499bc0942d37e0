// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! vidstore-bench entry point.

fn main() {
    if let Err(e) = vidstore_bench_cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use catalog_sync::{Cli, Error};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = catalog_sync::run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr so command output on stdout stays clean. `RUST_LOG` wins
/// over `--verbose`.
fn setup_logging(verbose: bool) -> Result<(), Error> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

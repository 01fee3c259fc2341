// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const QUICKSTART_HELP: &str = "\
Get started:
  catalog-sync submit --name \"Runner\" --price 49.99 --tax 18 --type shoes
  catalog-sync pending        List submissions waiting for the service
  catalog-sync drain          Retry pending submissions now
  catalog-sync watch          Retry automatically whenever the service is back";

#[derive(Parser, Debug)]
#[command(name = "catalog-sync")]
#[command(about = "Submit products to the catalog, saving them locally while offline")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Path to the config file (default: <config dir>/catalog-sync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the local backlog (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Catalog endpoint URL (overrides the config file)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a product, or save it for later if the service is unreachable
    #[command(after_help = "Product types: Shoes, Electronics, Service, Product, Clothing, Others")]
    Submit {
        /// Product name
        #[arg(long)]
        name: String,

        /// Selling price (must be greater than 0)
        #[arg(long)]
        price: String,

        /// Tax rate (0 or more)
        #[arg(long)]
        tax: String,

        /// Product type
        #[arg(long = "type", value_name = "TYPE")]
        product_type: String,

        /// JPEG image to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// List submissions waiting in the local backlog
    Pending,

    /// Check connectivity and, if reachable, retry every pending submission once
    Drain,

    /// Keep probing connectivity and drain on every reconnect until Ctrl-C
    ///
    /// Holds the backlog open while running; other commands using the same
    /// data directory fail until it stops.
    Watch,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

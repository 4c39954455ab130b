//! Itemsync CLI Binary
//!
//! Command-line interface for catalog discovery and enrichment.

use anyhow::Context;
use clap::Parser;
use itemsync::logging::init_logging;
use itemsync::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: Cli) -> anyhow::Result<String> {
    let config = cli.resolve_config().context("Error loading configuration")?;
    init_logging(Some(&config.logging)).context("Error initializing logging")?;

    let context = CliContext::new(config).context("Error opening catalog")?;
    let command = cli.command.clone().unwrap_or_default();
    let output = context.execute(&command)?;
    Ok(output)
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

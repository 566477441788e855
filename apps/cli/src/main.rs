mod args;
mod commands;
mod config;

use crate::args::Cli;
use anyhow::Context;
use clap::Parser;
use fsdocs_logger::Logger;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut cfg = config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(root) = cli.root {
        cfg.store.root = root;
    }
    if let Some(prefix_length) = cli.prefix_length {
        cfg.store.prefix_length = prefix_length;
    }

    let _logger = Logger::builder().name(env!("CARGO_PKG_NAME")).config(&cfg.log)?.init()?;

    let outcome = commands::run(cli.command, &cfg.store, &mut std::io::stdout().lock()).await?;
    Ok(outcome.into())
}

//! # CLI Argument Definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fsdocs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Read, write and repair an fsdocs document store")]
pub(crate) struct Cli {
    /// Configuration file (any format the `config` crate understands). Defaults to `fsdocs.*`.
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Store root directory, overriding the configuration.
    #[arg(long, global = true)]
    pub(crate) root: Option<PathBuf>,

    /// Shard prefix length, overriding the configuration.
    #[arg(long, global = true)]
    pub(crate) prefix_length: Option<usize>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Print the current document, or a specific version
    Get {
        key: String,
        /// Read the immutable snapshot of this version instead of `current.json`
        #[arg(long)]
        version: Option<u64>,
    },
    /// Write a JSON object as the next version of a key
    Put {
        key: String,
        /// The document, a JSON object
        json: String,
        /// Use the `_version` in the given JSON as-is instead of the stored one
        #[arg(long)]
        fresh: bool,
    },
    /// List the versions that have snapshots
    History { key: String },
    /// Report and remove stale lock markers and staged files
    Repair {
        /// Only touch files older than this many seconds
        #[arg(long, default_value_t = 3600)]
        max_age: u64,
        /// Report without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
}

use crate::args::Command;
use anyhow::Context;
use fsdocs_store::{Document, Store, StoreConfig};
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

/// How a command ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Done,
    Absent,
    Conflict,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Self::SUCCESS,
            Outcome::Absent | Outcome::Conflict => Self::from(1),
        }
    }
}

pub(crate) async fn run(
    command: Command,
    config: &StoreConfig,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    match command {
        Command::Get { key, version } => get(&open(config).await?, &key, version, out).await,
        Command::Put { key, json, fresh } => {
            put(&open(config).await?, &key, &json, fresh, out).await
        },
        Command::History { key } => history(&open(config).await?, &key, out).await,
        Command::Repair { max_age, dry_run } => {
            // The connect sweep would delete staged files before a dry run could report them.
            let store =
                Store::builder().config(config).temp_max_age(Duration::MAX).connect().await?;
            repair(&store, Duration::from_secs(max_age), dry_run, out).await
        },
    }
}

async fn open(config: &StoreConfig) -> anyhow::Result<Store> {
    Store::builder()
        .config(config)
        .connect()
        .await
        .with_context(|| format!("Failed to open store at {}", config.root.display()))
}

async fn get(
    store: &Store,
    key: &str,
    version: Option<u64>,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    let document = match version {
        Some(v) => store.get_version(key, v).await?,
        None => store.get(key).await?,
    };

    let Some(document) = document else {
        writeln!(out, "absent")?;
        return Ok(Outcome::Absent);
    };

    writeln!(out, "{}", serde_json::to_string_pretty(&document)?)?;
    Ok(Outcome::Done)
}

async fn put(
    store: &Store,
    key: &str,
    json: &str,
    fresh: bool,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    let value: serde_json::Value =
        serde_json::from_str(json).context("Argument is not valid JSON")?;
    let mut document = Document::try_from(value)?;

    if !fresh {
        match store.get(key).await?.and_then(|current| current.version()) {
            Some(version) => document.set_version(version),
            None => document.clear_version(),
        }
    }

    let committed = match store.put(key, &mut document).await {
        Err(err) if err.committed_version().is_some() => {
            writeln!(out, "committed {}", err.committed_version().unwrap_or_default())?;
            return Err(err).context("Run `fsdocs repair` to release the key");
        },
        result => result?,
    };
    if committed {
        let version = document.version().unwrap_or_default();
        info!(key, version, "Document committed");
        writeln!(out, "committed {version}")?;
        Ok(Outcome::Done)
    } else {
        writeln!(out, "conflict")?;
        Ok(Outcome::Conflict)
    }
}

async fn history(store: &Store, key: &str, out: &mut impl Write) -> anyhow::Result<Outcome> {
    for version in store.history(key).await? {
        writeln!(out, "{version}")?;
    }
    Ok(Outcome::Done)
}

async fn repair(
    store: &Store,
    max_age: Duration,
    dry_run: bool,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    let locks = store.stale_locks(max_age).await?;
    let staged = store.stale_staged(max_age).await?;

    for path in &locks {
        writeln!(out, "stale lock {}", path.display())?;
    }
    for path in &staged {
        writeln!(out, "staged file {}", path.display())?;
    }

    if dry_run {
        writeln!(out, "dry run: {} locks, {} staged files", locks.len(), staged.len())?;
        return Ok(Outcome::Done);
    }

    let broken = store.break_stale_locks(max_age).await?;
    let swept = store.sweep_staged_older_than(max_age).await;
    writeln!(out, "removed {broken} locks, {swept} staged files")?;
    Ok(Outcome::Done)
}

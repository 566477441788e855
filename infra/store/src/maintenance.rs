//! Out-of-band repair of what crashed writers leave behind.
//!
//! A writer that dies mid-protocol can leave a staged file and, worse, a lock
//! marker. `put` never times a lock out; these sweeps are the explicit repair
//! step. They only ever delete staged files and lock markers, never snapshots,
//! `current.json`, or directories.

use crate::layout::{self, LOCK_FILE};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Staged files whose age exceeds `max_age`.
pub(crate) fn stale_staged_blocking(root: &Path, max_age: Duration) -> Vec<PathBuf> {
    let now = SystemTime::now();
    files(root)
        .filter(|e| is_staged(e) && is_stale(e, now, max_age))
        .map(DirEntry::into_path)
        .collect()
}

/// Removes staged files older than `max_age`. Returns `(removed, failed)`.
pub(crate) fn sweep_staged_blocking(root: &Path, max_age: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    for path in stale_staged_blocking(root, max_age) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove staged file");
                failed += 1;
            },
        }
    }

    (removed, failed)
}

pub(crate) async fn sweep_staged(root: &Path, max_age: Duration) -> usize {
    let root = root.to_path_buf();

    match tokio::task::spawn_blocking(move || sweep_staged_blocking(&root, max_age)).await {
        Ok((removed, failed)) => {
            if removed > 0 || failed > 0 {
                info!(removed, failed, "Cleaned up staged files");
            }
            removed
        },
        Err(e) => {
            error!(error = %e, "Staged file cleanup task panicked");
            0
        },
    }
}

/// Lock markers whose age exceeds `max_age`.
///
/// A marker is a hard link to the staged bytes, so its mtime is when the
/// abandoned write staged its data.
pub(crate) fn stale_locks_blocking(root: &Path, max_age: Duration) -> Vec<PathBuf> {
    let now = SystemTime::now();
    files(root)
        .filter(|e| e.file_name() == LOCK_FILE && is_stale(e, now, max_age))
        .map(DirEntry::into_path)
        .collect()
}

/// Deletes stale lock markers. Returns how many were removed.
///
/// A writer still running after `max_age` loses its lock; pick a threshold well
/// above the slowest expected write.
pub(crate) fn break_stale_locks_blocking(root: &Path, max_age: Duration) -> usize {
    let mut broken = 0;
    for lock in stale_locks_blocking(root, max_age) {
        match std::fs::remove_file(&lock) {
            Ok(()) => {
                warn!(lock = %lock.display(), "Broke stale lock marker");
                broken += 1;
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => error!(lock = %lock.display(), error = %e, "Failed to break lock marker"),
        }
    }
    broken
}

fn files(root: &Path) -> impl Iterator<Item = DirEntry> + '_ {
    WalkDir::new(root).into_iter().flatten().filter(|e| e.file_type().is_file())
}

fn is_staged(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(layout::is_staging)
}

fn is_stale(entry: &DirEntry, now: SystemTime, max_age: Duration) -> bool {
    let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
        return true;
    };
    now.duration_since(modified).is_ok_and(|age| age >= max_age)
}

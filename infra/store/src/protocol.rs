//! The write protocol for one `put`, expressed once as a state machine.
//!
//! [`PutProtocol`] never touches the filesystem itself. It hands out the next
//! [`FsOp`] and consumes that operation's `io::Result`. The blocking and async
//! drivers in [`crate::writer`] only execute operations, so both call conventions
//! walk the exact same sequence:
//!
//! ```text
//! [MATERIALIZE] -> STAGE -> ACQUIRE_LOCK -+-> CONFLICT_LOCK
//!                                          +-> COMMIT_VERSION -+-> CONFLICT_VERSION
//!                                                              +-> PUBLISH -> SYNC_DIR -> RELEASE_LOCK -> DONE
//! ```
//!
//! The two hard links are the only compare-and-swap points: `lock` guards the key,
//! `<n>.json` guards the version number. The rename onto `current.json` is the
//! single moment the new version becomes visible. Whatever the verdict, the machine
//! then removes the staged file if it still exists and releases the lock if held.

use crate::error::DocStoreError;
use crate::layout::DocumentPaths;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One filesystem step requested by the protocol.
#[derive(Debug)]
pub(crate) enum FsOp<'a> {
    /// Create the directory chain below `root` down to `dir`.
    EnsureDir { root: &'a Path, dir: &'a Path },
    /// Create `path` exclusively, write `data`, and sync it.
    Stage { path: &'a Path, data: &'a [u8] },
    /// Hard-link `original` as `link`, failing if `link` exists.
    Link { original: &'a Path, link: &'a Path },
    /// Atomically replace `to` with `from`.
    Rename { from: &'a Path, to: &'a Path },
    /// Flush directory entries of `dir`.
    SyncDir { dir: &'a Path },
    Remove { path: &'a Path },
}

/// Why a write was refused without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Conflict {
    /// Another writer holds the key's lock marker.
    Locked,
    /// The target version number was already committed.
    VersionTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Materialize,
    Stage,
    AcquireLock,
    CommitVersion,
    Publish,
    SyncDir,
    DiscardStaged,
    ReleaseLock,
    Done,
}

#[derive(Debug)]
enum Verdict {
    Committed,
    Refused(Conflict),
    Fault(DocStoreError),
}

/// Outcome of a finished protocol run.
#[derive(Debug)]
pub(crate) enum PutOutcome {
    Committed,
    Refused(Conflict),
}

#[derive(Debug)]
pub(crate) struct PutProtocol {
    root: PathBuf,
    paths: DocumentPaths,
    staged: PathBuf,
    snapshot: PathBuf,
    version: u64,
    data: Vec<u8>,
    phase: Phase,
    staged_exists: bool,
    lock_held: bool,
    verdict: Option<Verdict>,
}

impl PutProtocol {
    /// Plans a write of `data` as `version` into `paths.dir`.
    ///
    /// The directory chain is only materialized for version 1; later versions
    /// assume the directory a previous commit created.
    pub(crate) fn new(
        root: PathBuf,
        paths: DocumentPaths,
        version: u64,
        data: Vec<u8>,
        seq: u64,
    ) -> Self {
        let staged = paths.staging(version, seq);
        let snapshot = paths.snapshot(version);
        let phase = if version == 1 { Phase::Materialize } else { Phase::Stage };

        Self {
            root,
            paths,
            staged,
            snapshot,
            version,
            data,
            phase,
            staged_exists: false,
            lock_held: false,
            verdict: None,
        }
    }

    pub(crate) const fn version(&self) -> u64 {
        self.version
    }

    /// The next operation to execute, or `None` once the run is complete.
    pub(crate) fn next_op(&self) -> Option<FsOp<'_>> {
        let op = match self.phase {
            Phase::Materialize => FsOp::EnsureDir { root: &self.root, dir: &self.paths.dir },
            Phase::Stage => FsOp::Stage { path: &self.staged, data: &self.data },
            Phase::AcquireLock => FsOp::Link { original: &self.staged, link: &self.paths.lock },
            Phase::CommitVersion => FsOp::Link { original: &self.staged, link: &self.snapshot },
            Phase::Publish => FsOp::Rename { from: &self.staged, to: &self.paths.current },
            Phase::SyncDir => FsOp::SyncDir { dir: &self.paths.dir },
            Phase::DiscardStaged => FsOp::Remove { path: &self.staged },
            Phase::ReleaseLock => FsOp::Remove { path: &self.paths.lock },
            Phase::Done => return None,
        };
        Some(op)
    }

    /// Feeds the result of the operation returned by the last [`Self::next_op`].
    pub(crate) fn advance(&mut self, result: io::Result<()>) {
        match (self.phase, result) {
            (Phase::Done, _) => {},

            (Phase::Materialize, Ok(())) => self.phase = Phase::Stage,
            (Phase::Materialize, Err(err)) => {
                self.fail(err, "Failed to create document directory");
            },

            (Phase::Stage, Ok(())) => {
                self.staged_exists = true;
                self.phase = Phase::AcquireLock;
            },
            (Phase::Stage, Err(err)) => {
                // `create_new` refusing means the name belongs to someone else; any
                // other failure may leave a partial file of ours behind.
                self.staged_exists = err.kind() != io::ErrorKind::AlreadyExists;
                self.fail(err, "Failed to stage new version");
            },

            (Phase::AcquireLock, Ok(())) => {
                self.lock_held = true;
                self.phase = Phase::CommitVersion;
            },
            (Phase::AcquireLock, Err(err)) if err.kind() == io::ErrorKind::AlreadyExists => {
                debug!(lock = %self.paths.lock.display(), "Lock marker held by another writer");
                self.refuse(Conflict::Locked);
            },
            (Phase::AcquireLock, Err(err)) => self.fail(err, "Failed to acquire lock marker"),

            (Phase::CommitVersion, Ok(())) => self.phase = Phase::Publish,
            (Phase::CommitVersion, Err(err)) if err.kind() == io::ErrorKind::AlreadyExists => {
                debug!(
                    snapshot = %self.snapshot.display(),
                    version = self.version,
                    "Version already committed by another writer"
                );
                self.refuse(Conflict::VersionTaken);
            },
            (Phase::CommitVersion, Err(err)) => self.fail(err, "Failed to commit version snapshot"),

            (Phase::Publish, Ok(())) => {
                self.staged_exists = false;
                self.verdict = Some(Verdict::Committed);
                self.phase = Phase::SyncDir;
            },
            (Phase::Publish, Err(err)) => self.fail(err, "Failed to publish current version"),

            (Phase::SyncDir, result) => {
                if let Err(err) = result {
                    warn!(dir = %self.paths.dir.display(), error = %err, "Directory sync failed");
                }
                self.settle();
            },

            (Phase::DiscardStaged, result) => {
                match result {
                    Err(err) if err.kind() != io::ErrorKind::NotFound => {
                        warn!(path = %self.staged.display(), error = %err, "Staged file left behind");
                    },
                    _ => {},
                }
                self.staged_exists = false;
                self.settle();
            },

            (Phase::ReleaseLock, result) => {
                self.lock_held = false;
                match result {
                    Ok(()) => {},
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {
                        warn!(lock = %self.paths.lock.display(), "Lock marker vanished before release");
                    },
                    Err(err) if matches!(self.verdict, Some(Verdict::Fault(_))) => {
                        warn!(lock = %self.paths.lock.display(), error = %err, "Lock marker left behind");
                    },
                    Err(err) => {
                        let context = format!(
                            "Failed to release lock marker: {}",
                            self.paths.lock.display()
                        );
                        let fault = if matches!(self.verdict, Some(Verdict::Committed)) {
                            DocStoreError::Unreleased {
                                version: self.version,
                                source: err,
                                context: Some(context.into()),
                            }
                        } else {
                            DocStoreError::Io { source: err, context: Some(context.into()) }
                        };
                        self.verdict = Some(Verdict::Fault(fault));
                    },
                }
                self.settle();
            },
        }
    }

    /// Consumes the finished run.
    ///
    /// # Errors
    ///
    /// Returns the first fault recorded during the run.
    pub(crate) fn finish(self) -> Result<PutOutcome, DocStoreError> {
        match self.verdict {
            Some(Verdict::Committed) if self.phase == Phase::Done => Ok(PutOutcome::Committed),
            Some(Verdict::Refused(conflict)) if self.phase == Phase::Done => {
                Ok(PutOutcome::Refused(conflict))
            },
            Some(Verdict::Fault(err)) => Err(err),
            _ => Err(DocStoreError::Io {
                source: io::Error::other("put protocol finished early"),
                context: Some(format!("{:?}", self.phase).into()),
            }),
        }
    }

    fn refuse(&mut self, conflict: Conflict) {
        self.verdict = Some(Verdict::Refused(conflict));
        self.settle();
    }

    fn fail(&mut self, source: io::Error, what: &str) {
        let target = match self.phase {
            Phase::Materialize => &self.paths.dir,
            Phase::AcquireLock => &self.paths.lock,
            Phase::CommitVersion => &self.snapshot,
            Phase::Publish => &self.paths.current,
            _ => &self.staged,
        };
        let context = format!("{what}: {}", target.display());
        self.verdict = Some(Verdict::Fault(DocStoreError::Io { source, context: Some(context.into()) }));
        self.settle();
    }

    /// Picks the next cleanup step once a verdict is known.
    fn settle(&mut self) {
        self.phase = if self.staged_exists {
            Phase::DiscardStaged
        } else if self.lock_held {
            Phase::ReleaseLock
        } else {
            Phase::Done
        };
    }
}

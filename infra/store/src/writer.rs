//! Blocking and async drivers for [`PutProtocol`].
//!
//! Both drivers execute one [`FsOp`] at a time and feed the result back, so the
//! lock → commit → publish → unlock ordering lives in the protocol alone.

use crate::error::DocStoreError;
use crate::materialize;
use crate::protocol::{FsOp, PutOutcome, PutProtocol};
use std::io::{self, Write};
use tokio::io::AsyncWriteExt;

pub(crate) fn run_blocking(mut protocol: PutProtocol) -> Result<PutOutcome, DocStoreError> {
    while let Some(op) = protocol.next_op() {
        let result = execute_blocking(&op);
        protocol.advance(result);
    }
    protocol.finish()
}

pub(crate) async fn run(mut protocol: PutProtocol) -> Result<PutOutcome, DocStoreError> {
    while let Some(op) = protocol.next_op() {
        let result = execute(&op).await;
        protocol.advance(result);
    }
    protocol.finish()
}

fn execute_blocking(op: &FsOp<'_>) -> io::Result<()> {
    match *op {
        FsOp::EnsureDir { root, dir } => materialize::ensure_blocking(root, dir),
        FsOp::Stage { path, data } => {
            let mut file = std::fs::OpenOptions::new().create_new(true).write(true).open(path)?;
            file.write_all(data)?;
            file.sync_all()
        },
        FsOp::Link { original, link } => std::fs::hard_link(original, link),
        FsOp::Rename { from, to } => std::fs::rename(from, to),
        FsOp::SyncDir { dir } => std::fs::File::open(dir)?.sync_all(),
        FsOp::Remove { path } => std::fs::remove_file(path),
    }
}

async fn execute(op: &FsOp<'_>) -> io::Result<()> {
    match *op {
        FsOp::EnsureDir { root, dir } => materialize::ensure(root, dir).await,
        FsOp::Stage { path, data } => {
            let mut file =
                tokio::fs::OpenOptions::new().create_new(true).write(true).open(path).await?;
            file.write_all(data).await?;
            file.sync_all().await
        },
        FsOp::Link { original, link } => tokio::fs::hard_link(original, link).await,
        FsOp::Rename { from, to } => tokio::fs::rename(from, to).await,
        FsOp::SyncDir { dir } => tokio::fs::File::open(dir).await?.sync_all().await,
        FsOp::Remove { path } => tokio::fs::remove_file(path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DocumentPaths;
    use crate::protocol::Conflict;
    use std::path::Path;
    use tempfile::TempDir;

    fn plan(root: &Path, version: u64, body: &[u8], seq: u64) -> PutProtocol {
        let paths = DocumentPaths::new(root.join("doc"));
        PutProtocol::new(root.to_path_buf(), paths, version, body.to_vec(), seq)
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn blocking_commit_leaves_snapshot_and_current_only() {
        let tmp = TempDir::new().unwrap();
        let outcome = run_blocking(plan(tmp.path(), 1, b"{\"a\":1}", 1)).unwrap();
        assert!(matches!(outcome, PutOutcome::Committed));

        let dir = tmp.path().join("doc");
        assert_eq!(names(&dir), vec!["1.json", "current.json"]);
        assert_eq!(std::fs::read(dir.join("current.json")).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn blocking_held_lock_refuses_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("doc");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("lock"), b"").unwrap();

        let outcome = run_blocking(plan(tmp.path(), 1, b"{}", 1)).unwrap();
        assert!(matches!(outcome, PutOutcome::Refused(Conflict::Locked)));
        assert_eq!(names(&dir), vec!["lock"]);
    }

    #[tokio::test]
    async fn async_taken_version_refuses_and_unlocks() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(run(plan(tmp.path(), 1, b"{}", 1)).await, Ok(PutOutcome::Committed)));

        let outcome = run(plan(tmp.path(), 1, b"{\"late\":true}", 2)).await.unwrap();
        assert!(matches!(outcome, PutOutcome::Refused(Conflict::VersionTaken)));

        let dir = tmp.path().join("doc");
        assert_eq!(names(&dir), vec!["1.json", "current.json"]);
        assert_eq!(std::fs::read(dir.join("current.json")).unwrap(), b"{}");
    }

    #[tokio::test]
    async fn async_missing_directory_for_later_version_is_a_fault() {
        let tmp = TempDir::new().unwrap();
        let err = run(plan(tmp.path(), 2, b"{}", 1)).await.unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
    }
}

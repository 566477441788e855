//! The [`Store`] handle: key resolution, reads, and the two `put` call conventions.
//!
//! Every operation comes in an async form (over `tokio::fs`, never blocking the
//! calling thread) and a `_blocking` form (over `std::fs`). Both share the same
//! path computation, result classification and write protocol.

use crate::builder::StoreBuilder;
use crate::document::{Document, kind_of};
use crate::error::{DocStoreError, DocStoreErrorExt};
use crate::layout::{self, DocumentPaths};
use crate::protocol::{PutOutcome, PutProtocol};
use crate::{maintenance, reader, writer};
use serde_json::Value;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The internal shared state of a [`Store`] instance.
#[derive(Debug)]
pub struct StoreInner {
    /// The canonicalized physical path under which all documents live.
    pub(crate) root: PathBuf,
    /// Leading key characters used as a shard directory; `0` disables sharding.
    pub(crate) prefix_length: usize,
    /// Age after which staged files count as abandoned.
    pub(crate) temp_max_age: Duration,
}

/// A thread-safe handle to a filesystem document store.
///
/// Writers coordinate purely through the filesystem (hard links and rename), so
/// independent handles, threads and processes may write the same store
/// concurrently. The handle is reference-counted and cheap to clone.
///
/// # Example
///
/// ```rust
/// use fsdocs_store::{Document, DocStoreError, Store};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), DocStoreError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     let store = Store::builder().root(tmp.path().join("docs")).connect().await?;
///
///     let mut doc = Document::try_from(json!({ "title": "internet", "age": 35.5 }))?;
///     assert!(store.put("doc1", &mut doc).await?);
///     assert_eq!(doc.version(), Some(1));
///
///     let stored = store.get("doc1").await?.expect("committed");
///     assert_eq!(stored, doc);
///
///     // A second writer starting from scratch targets version 1 again and loses.
///     let mut stale = Document::try_from(json!({ "title": "internet", "age": 35.5 }))?;
///     assert!(!store.put("doc1", &mut stale).await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Deref for Store {
    type Target = StoreInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Store {
    #[must_use = "The store is not opened until you call .connect()"]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// The canonical store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    /// Resolves a key to its document directory. Pure path computation.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::InvalidKey`] for absolute keys or keys whose `..`
    /// segments climb above the store root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, DocStoreError> {
        layout::resolve(&self.root, self.prefix_length, key)
    }

    fn paths(&self, key: &str) -> Result<DocumentPaths, DocStoreError> {
        self.resolve(key).map(DocumentPaths::new)
    }

    /// Reads the current version of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Decode`] if the stored bytes are not a document,
    /// [`DocStoreError::Io`] for filesystem faults other than absence, and
    /// [`DocStoreError::InvalidKey`] for escaping keys. A key that was never
    /// written yields `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<Document>, DocStoreError> {
        self.get_version(key, 0).await
    }

    /// Reads snapshot `version` of `key`; `0` reads the current version.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`]; a version that was never committed yields `Ok(None)`.
    pub async fn get_version(
        &self,
        key: &str,
        version: u64,
    ) -> Result<Option<Document>, DocStoreError> {
        let target = self.paths(key)?.target(version);
        reader::interpret(&target, tokio::fs::read(&target).await)
    }

    /// Blocking counterpart of [`Self::get`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub fn get_blocking(&self, key: &str) -> Result<Option<Document>, DocStoreError> {
        self.get_version_blocking(key, 0)
    }

    /// Blocking counterpart of [`Self::get_version`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub fn get_version_blocking(
        &self,
        key: &str,
        version: u64,
    ) -> Result<Option<Document>, DocStoreError> {
        let target = self.paths(key)?.target(version);
        reader::interpret(&target, std::fs::read(&target))
    }

    /// Writes `document` as the next version of `key`.
    ///
    /// The target version is the document's own counter plus one (or 1 without a
    /// counter), and is written back into `document` before any I/O. The counter
    /// is not compared with what is stored: a write conflicts only if another
    /// writer holds the key's lock or already committed that exact version.
    ///
    /// Returns `Ok(true)` once the version is visible as current and `Ok(false)`
    /// on contention. Nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Io`] for filesystem faults at any step, after
    /// best-effort removal of the staged file and lock marker this call created.
    /// Returns [`DocStoreError::Unreleased`] when the version was committed and
    /// published but its lock marker could not be removed; the write took effect
    /// (see [`DocStoreError::committed_version`]) and the key stays locked until
    /// the marker is repaired.
    pub async fn put(&self, key: &str, document: &mut Document) -> Result<bool, DocStoreError> {
        let protocol = self.plan(key, document)?;
        let version = protocol.version();
        let outcome = writer::run(protocol).await;
        Ok(report(key, version, outcome?))
    }

    /// Blocking counterpart of [`Self::put`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::put`].
    pub fn put_blocking(&self, key: &str, document: &mut Document) -> Result<bool, DocStoreError> {
        let protocol = self.plan(key, document)?;
        let version = protocol.version();
        let outcome = writer::run_blocking(protocol);
        Ok(report(key, version, outcome?))
    }

    /// [`Self::put`] for dynamically typed input.
    ///
    /// The advanced counter is written back into `value`.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::NotADocument`] without touching the filesystem if
    /// `value` is not a JSON object; otherwise as [`Self::put`].
    pub async fn put_value(&self, key: &str, value: &mut Value) -> Result<bool, DocStoreError> {
        let mut document = take_document(value)?;
        let result = self.put(key, &mut document).await;
        *value = document.into();
        result
    }

    /// Blocking counterpart of [`Self::put_value`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::put_value`].
    pub fn put_value_blocking(&self, key: &str, value: &mut Value) -> Result<bool, DocStoreError> {
        let mut document = take_document(value)?;
        let result = self.put_blocking(key, &mut document);
        *value = document.into();
        result
    }

    /// Committed version numbers of `key`, ascending. Unknown keys have none.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Io`] if the document directory cannot be listed.
    pub async fn history(&self, key: &str) -> Result<Vec<u64>, DocStoreError> {
        let dir = self.resolve(key)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if reader::is_absent(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err).context(format!("List failed: {}", dir.display())),
        };

        let mut names = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.context(format!("List failed: {}", dir.display()))?
        {
            names.push(entry.file_name());
        }
        Ok(reader::versions(names))
    }

    /// Blocking counterpart of [`Self::history`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::history`].
    pub fn history_blocking(&self, key: &str) -> Result<Vec<u64>, DocStoreError> {
        let dir = self.resolve(key)?;
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if reader::is_absent(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err).context(format!("List failed: {}", dir.display())),
        };

        let names = entries
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<Result<Vec<_>, _>>()
            .context(format!("List failed: {}", dir.display()))?;
        Ok(reader::versions(names))
    }

    /// Removes staged files older than the configured age. Returns how many.
    pub async fn sweep_staged(&self) -> usize {
        self.sweep_staged_older_than(self.temp_max_age).await
    }

    /// Removes staged files older than `max_age`, ignoring the configured age.
    pub async fn sweep_staged_older_than(&self, max_age: Duration) -> usize {
        maintenance::sweep_staged(&self.root, max_age).await
    }

    /// Staged files older than `max_age`, i.e. left behind by writers that died mid-put.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Io`] if the scan task fails.
    pub async fn stale_staged(&self, max_age: Duration) -> Result<Vec<PathBuf>, DocStoreError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || maintenance::stale_staged_blocking(&root, max_age))
            .await
            .map_err(std::io::Error::other)
            .context("Staged file scan task failed")
    }

    /// Lock markers older than `max_age`, i.e. likely abandoned by crashed writers.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Io`] if the scan task fails.
    pub async fn stale_locks(&self, max_age: Duration) -> Result<Vec<PathBuf>, DocStoreError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || maintenance::stale_locks_blocking(&root, max_age))
            .await
            .map_err(std::io::Error::other)
            .context("Lock scan task failed")
    }

    /// Deletes lock markers older than `max_age`, unblocking their keys.
    ///
    /// This is the manual repair step for writers that died holding a lock.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Io`] if the repair task fails.
    pub async fn break_stale_locks(&self, max_age: Duration) -> Result<usize, DocStoreError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || maintenance::break_stale_locks_blocking(&root, max_age))
            .await
            .map_err(std::io::Error::other)
            .context("Lock repair task failed")
    }

    /// Shared preparation of both `put` forms; performs no I/O.
    fn plan(&self, key: &str, document: &mut Document) -> Result<PutProtocol, DocStoreError> {
        let paths = self.paths(key)?;
        let version = document.advance_version();
        let data = document.encode()?;
        Ok(PutProtocol::new(self.root.clone(), paths, version, data, layout::next_staging_seq()))
    }
}

fn take_document(value: &mut Value) -> Result<Document, DocStoreError> {
    match value {
        Value::Object(map) => Ok(Document::from(std::mem::take(map))),
        other => Err(DocStoreError::NotADocument {
            message: kind_of(other).into(),
            context: Some("document must be an object".into()),
        }),
    }
}

fn report(key: &str, version: u64, outcome: PutOutcome) -> bool {
    match outcome {
        PutOutcome::Committed => {
            debug!(key, version, "Document committed");
            true
        },
        PutOutcome::Refused(conflict) => {
            debug!(key, version, ?conflict, "Document write refused");
            false
        },
    }
}

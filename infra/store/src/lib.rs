//! A minimal, embeddable document store kept directly on a filesystem.
//!
//! Each key maps to a directory of immutable version snapshots plus a
//! `current.json` pointer. Concurrency control between writers, whether threads,
//! tasks or unrelated processes, uses no in-process locks at all: only
//! filesystem primitives that are atomic on their own.
//!
//! # Core Features
//!
//! - **Optimistic Concurrency**: hard-link creation acts as compare-and-swap, once
//!   for a per-key lock marker and once for the per-version snapshot name. Losing
//!   either race is reported as `Ok(false)`, never as an error.
//! - **Atomic Visibility**: new versions are published by renaming over
//!   `current.json`; readers see the old or the new document, never a mix.
//! - **Versioned Snapshots**: every committed version stays readable as `<n>.json`.
//! - **Sharding**: an optional key-prefix split keeps directories small.
//! - **Two Call Conventions**: every operation has an async form (tokio) and a
//!   `_blocking` form, both driving the same write protocol.
//!
//! # Layout
//!
//! ```text
//! <root>/<key>/current.json   latest committed version
//! <root>/<key>/<n>.json       snapshot of version n
//! <root>/<key>/lock           present only while a write is in flight
//! ```
//!
//! # Examples
//!
//! ```rust
//! use fsdocs_store::{Document, DocStoreError, Store};
//! use serde_json::json;
//!
//! fn main() -> Result<(), DocStoreError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("docs");
//!     let store = Store::builder().root(&root).prefix_length(2).connect_blocking()?;
//!
//!     let mut doc = Document::try_from(json!({ "title": "internet" }))?;
//!     assert!(store.put_blocking("article-1", &mut doc)?);
//!
//!     doc.insert("title", "internets");
//!     assert!(store.put_blocking("article-1", &mut doc)?);
//!
//!     assert_eq!(store.history_blocking("article-1")?, vec![1, 2]);
//!     let first = store.get_version_blocking("article-1", 1)?.expect("version 1");
//!     assert_eq!(first["title"], "internet");
//!     assert!(store.get_blocking("missing")?.is_none());
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! A writer that crashes while holding a key's lock marker blocks further writes
//! to that key until the marker is removed, e.g. with
//! [`Store::break_stale_locks`].

mod builder;
mod config;
mod document;
mod engine;
mod error;
mod layout;
mod maintenance;
mod materialize;
mod protocol;
mod reader;
mod writer;

pub use builder::StoreBuilder;
pub use config::StoreConfig;
pub use document::{Document, VERSION_FIELD};
pub use engine::Store;
pub use error::{DocStoreError, DocStoreErrorExt};

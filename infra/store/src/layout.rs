//! On-disk layout: key to directory resolution and the file names inside a
//! document directory.
//!
//! ```text
//! <dir>/current.json   bytes of the latest committed version
//! <dir>/<n>.json       immutable snapshot of version n
//! <dir>/lock           present only during an in-flight write
//! ```
//!
//! `current.json` and the newest `<n>.json` are hard links to one inode. Edit
//! either by writing a new file and renaming it into place, never in place.

use crate::error::DocStoreError;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) const CURRENT_FILE: &str = "current.json";
pub(crate) const LOCK_FILE: &str = "lock";
/// Marker embedded in staged file names; the maintenance sweep keys off it.
pub(crate) const TMP_MARKER: &str = ".fsdocstmp.";
const SNAPSHOT_SUFFIX: &str = ".json";

/// Process-wide, so two handles opened on one root never draw the same staged name.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(1);

/// Next sequence number for [`DocumentPaths::staging`].
pub(crate) fn next_staging_seq() -> u64 {
    STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Maps a key to its document directory below `root`.
///
/// With `prefix_length > 0` and a key longer than the prefix (in characters), the
/// key is split into `<prefix>/<rest>`. Keys may nest with `/`; a key that is
/// absolute or climbs above the root is rejected. No filesystem access.
pub(crate) fn resolve(
    root: &Path,
    prefix_length: usize,
    key: &str,
) -> Result<PathBuf, DocStoreError> {
    let split = if prefix_length > 0 {
        key.char_indices().nth(prefix_length).map(|(idx, _)| idx)
    } else {
        None
    };

    let relative = match split {
        Some(idx) => normalize_relative(key, &format!("{}/{}", &key[..idx], &key[idx..]))?,
        None => normalize_relative(key, key)?,
    };

    Ok(root.join(relative))
}

/// Collapses `.` and `..` lexically, refusing anything that leaves the root.
fn normalize_relative(key: &str, path: &str) -> Result<PathBuf, DocStoreError> {
    let mut out = PathBuf::new();

    for c in Path::new(path).components() {
        match c {
            Component::CurDir => {},
            Component::Normal(seg) => out.push(seg),
            Component::ParentDir => {
                if !out.pop() {
                    return Err(DocStoreError::InvalidKey {
                        message: key.to_owned().into(),
                        context: Some("Key escapes the store root via '..'".into()),
                    });
                }
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(DocStoreError::InvalidKey {
                    message: key.to_owned().into(),
                    context: Some("Absolute keys are not allowed".into()),
                });
            },
        }
    }

    Ok(out)
}

/// Fixed file names of one document directory.
#[derive(Debug, Clone)]
pub(crate) struct DocumentPaths {
    pub(crate) dir: PathBuf,
    pub(crate) current: PathBuf,
    pub(crate) lock: PathBuf,
}

impl DocumentPaths {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { current: dir.join(CURRENT_FILE), lock: dir.join(LOCK_FILE), dir }
    }

    pub(crate) fn snapshot(&self, version: u64) -> PathBuf {
        self.dir.join(format!("{version}{SNAPSHOT_SUFFIX}"))
    }

    /// A staging name unique across processes (pid) and within one (`seq`).
    pub(crate) fn staging(&self, version: u64, seq: u64) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.subsec_nanos());
        self.dir.join(format!(
            "{version}{SNAPSHOT_SUFFIX}{TMP_MARKER}{}.{nanos}.{seq}",
            std::process::id()
        ))
    }

    /// `current.json` for version 0, `<n>.json` otherwise.
    pub(crate) fn target(&self, version: u64) -> PathBuf {
        if version == 0 { self.current.clone() } else { self.snapshot(version) }
    }
}

/// Parses `<n>.json` into `n`; everything else (current, lock, staging) is `None`.
pub(crate) fn snapshot_version(file_name: &str) -> Option<u64> {
    let digits = file_name.strip_suffix(SNAPSHOT_SUFFIX)?;
    // Canonical decimal only: `01.json` would otherwise shadow `1.json`.
    if digits.is_empty()
        || (digits.len() > 1 && digits.starts_with('0'))
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok().filter(|&v| v > 0)
}

pub(crate) fn is_staging(file_name: &str) -> bool {
    file_name.contains(TMP_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/docs")
    }

    #[test]
    fn unsharded_key_maps_to_single_segment() {
        assert_eq!(resolve(&root(), 0, "doc1").unwrap(), root().join("doc1"));
    }

    #[test]
    fn sharded_key_is_split_at_prefix() {
        assert_eq!(resolve(&root(), 2, "doc1").unwrap(), root().join("do").join("c1"));
    }

    #[test]
    fn short_keys_are_not_sharded() {
        assert_eq!(resolve(&root(), 4, "doc1").unwrap(), root().join("doc1"));
        assert_eq!(resolve(&root(), 4, "doc").unwrap(), root().join("doc"));
    }

    #[test]
    fn prefix_counts_characters_not_bytes() {
        assert_eq!(resolve(&root(), 2, "ñandú").unwrap(), root().join("ña").join("ndú"));
    }

    #[test]
    fn empty_key_is_a_literal_segment() {
        assert_eq!(resolve(&root(), 0, "").unwrap(), root());
        assert_eq!(resolve(&root(), 3, "").unwrap(), root());
    }

    #[test]
    fn nested_keys_are_preserved() {
        assert_eq!(resolve(&root(), 0, "users/42").unwrap(), root().join("users").join("42"));
    }

    #[test]
    fn escaping_keys_are_rejected() {
        for key in ["../etc", "a/../../b", "/etc/passwd"] {
            let err = resolve(&root(), 0, key).unwrap_err();
            assert!(matches!(err, DocStoreError::InvalidKey { .. }), "{key}: {err:?}");
        }
        assert!(resolve(&root(), 1, "/etc").is_err());
    }

    #[test]
    fn snapshot_names_round_trip() {
        let paths = DocumentPaths::new(root().join("doc"));
        let name = paths.snapshot(12);
        assert_eq!(snapshot_version(name.file_name().unwrap().to_str().unwrap()), Some(12));
        assert_eq!(paths.target(0), paths.current);
        assert_eq!(paths.target(3), paths.snapshot(3));
    }

    #[test]
    fn non_snapshot_names_are_ignored() {
        let names = [
            CURRENT_FILE,
            LOCK_FILE,
            "0.json",
            ".json",
            "1.json.fsdocstmp.1.2.3",
            "x1.json",
            "01.json",
            "007.json",
            "00.json",
        ];
        for name in names {
            assert_eq!(snapshot_version(name), None, "{name}");
        }
    }

    #[test]
    fn staging_names_are_recognized() {
        let paths = DocumentPaths::new(root().join("doc"));
        let first = paths.staging(1, 1);
        let second = paths.staging(1, 2);
        assert_ne!(first, second);
        assert!(is_staging(first.file_name().unwrap().to_str().unwrap()));
        assert!(!is_staging(CURRENT_FILE));
    }

    #[test]
    fn staging_sequence_is_shared_across_callers() {
        let first = next_staging_seq();
        let second = std::thread::spawn(next_staging_seq).join().unwrap();
        assert_ne!(first, second);
        assert_eq!(snapshot_version("10.json"), Some(10));
    }
}

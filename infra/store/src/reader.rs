//! Classification of snapshot reads.

use crate::document::Document;
use crate::error::DocStoreError;
use crate::layout;
use std::io;
use std::path::Path;

/// Maps a raw read of `path` to the reader contract.
///
/// A missing file or missing path component means the document (or version) was
/// never committed and is reported as `Ok(None)`.
pub(crate) fn interpret(
    path: &Path,
    read: io::Result<Vec<u8>>,
) -> Result<Option<Document>, DocStoreError> {
    match read {
        Ok(bytes) => Document::decode(&bytes)
            .map(Some)
            .map_err(|err| with_path(err, path)),
        Err(err) if is_absent(&err) => Ok(None),
        Err(err) => Err(DocStoreError::Io {
            source: err,
            context: Some(format!("Read failed: {}", path.display()).into()),
        }),
    }
}

/// Collects snapshot version numbers from directory entry names.
pub(crate) fn versions<I>(names: I) -> Vec<u64>
where
    I: IntoIterator<Item = std::ffi::OsString>,
{
    let mut versions: Vec<u64> = names
        .into_iter()
        .filter_map(|name| name.to_str().and_then(layout::snapshot_version))
        .collect();
    versions.sort_unstable();
    versions
}

pub(crate) fn is_absent(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

fn with_path(err: DocStoreError, path: &Path) -> DocStoreError {
    match err {
        DocStoreError::Decode { source, .. } => DocStoreError::Decode {
            source,
            context: Some(format!("Corrupt snapshot: {}", path.display()).into()),
        },
        other => other,
    }
}

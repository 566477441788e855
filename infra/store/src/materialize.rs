//! Lazy creation of a document's directory chain on its first write.
//!
//! Each level is created individually so a concurrent writer creating the same
//! level is indistinguishable from the level already being there.

use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Directories strictly below `root` down to `dir` inclusive, outermost first.
pub(crate) fn chain(root: &Path, dir: &Path) -> Vec<PathBuf> {
    let Ok(relative) = dir.strip_prefix(root) else {
        return vec![dir.to_path_buf()];
    };

    let mut current = root.to_path_buf();
    relative
        .components()
        .map(|c| {
            current.push(c);
            current.clone()
        })
        .collect()
}

fn tolerate_existing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

pub(crate) fn ensure_blocking(root: &Path, dir: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    std::os::unix::fs::DirBuilderExt::mode(&mut builder, DIR_MODE);

    for level in chain(root, dir) {
        tolerate_existing(builder.create(&level))?;
    }
    Ok(())
}

pub(crate) async fn ensure(root: &Path, dir: &Path) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(DIR_MODE);

    for level in chain(root, dir) {
        tolerate_existing(builder.create(&level).await)?;
    }
    Ok(())
}

use std::borrow::Cow;

/// A specialized [`DocStoreError`] enum of this crate.
///
/// Absence and write contention are not errors: reads report a missing document as
/// `Ok(None)` and writes report a lost race as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum DocStoreError {
    #[error("Invalid document key{}: {message}", format_context(.context))]
    InvalidKey { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Value is not a document{}: {message}", format_context(.context))]
    NotADocument { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Document encoding failure{}: {source}", format_context(.context))]
    Encode { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Document decoding failure{}: {source}", format_context(.context))]
    Decode { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Filesystem failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// The version is durably committed and visible, but its lock marker could not be
    /// removed. Later writes of this key block until the marker is repaired.
    #[error(
        "Version {version} committed but lock marker was kept{}: {source}",
        format_context(.context)
    )]
    Unreleased { version: u64, source: std::io::Error, context: Option<Cow<'static, str>> },
}

impl DocStoreError {
    /// Returns the underlying I/O error kind for filesystem faults.
    #[must_use]
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } | Self::Unreleased { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// Returns the version a failed write nevertheless committed, if any.
    #[must_use]
    pub const fn committed_version(&self) -> Option<u64> {
        match self {
            Self::Unreleased { version, .. } => Some(*version),
            _ => None,
        }
    }
}

pub trait DocStoreErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, DocStoreError>;
}

impl<T> DocStoreErrorExt<T> for Result<T, DocStoreError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                DocStoreError::InvalidKey { context: c, .. }
                | DocStoreError::NotADocument { context: c, .. }
                | DocStoreError::Encode { context: c, .. }
                | DocStoreError::Decode { context: c, .. }
                | DocStoreError::Io { context: c, .. }
                | DocStoreError::Unreleased { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

impl<T> DocStoreErrorExt<T> for Result<T, std::io::Error> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, DocStoreError> {
        self.map_err(|source| DocStoreError::Io { source, context: Some(context.into()) })
    }
}

impl From<std::io::Error> for DocStoreError {
    #[inline]
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, context: None }
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_rendered_in_message() {
        let err: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        let err = err.context("Writing lock marker").unwrap_err();
        assert_eq!(err.to_string(), "Filesystem failure (Writing lock marker): denied");
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn context_replaces_previous_context() {
        let err: Result<(), DocStoreError> = Err(DocStoreError::InvalidKey {
            message: "../x".into(),
            context: Some("first".into()),
        });
        let err = err.context("second").unwrap_err();
        assert_eq!(err.to_string(), "Invalid document key (second): ../x");
        assert!(err.io_kind().is_none());
    }

    #[test]
    fn unreleased_lock_names_the_committed_version() {
        let err = DocStoreError::Unreleased {
            version: 4,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            context: None,
        };
        assert_eq!(err.to_string(), "Version 4 committed but lock marker was kept: denied");
        assert_eq!(err.committed_version(), Some(4));
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::PermissionDenied));
    }
}

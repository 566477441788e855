use crate::config::StoreConfig;
use crate::engine::{Store, StoreInner};
use crate::error::{DocStoreError, DocStoreErrorExt};
use crate::maintenance;
use private::Sealed;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
struct Settings {
    prefix_length: usize,
    create: bool,
    temp_max_age: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let defaults = StoreConfig::default();
        Self {
            prefix_length: defaults.prefix_length,
            create: defaults.create,
            temp_max_age: defaults.temp_max_age(),
        }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct StoreBuilder<S: Sealed = NoRoot> {
    state: S,
    settings: Settings,
}

#[allow(private_bounds)]
impl<S: Sealed> StoreBuilder<S> {
    /// Number of leading key characters used as a shard directory (`0` = off).
    #[must_use = "Sets the sharding prefix length for the store"]
    pub const fn prefix_length(mut self, prefix_length: usize) -> Self {
        self.settings.prefix_length = prefix_length;
        self
    }

    #[must_use = "Sets whether the store root should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.settings.create = enable;
        self
    }

    /// Age after which staged files are treated as abandoned by the connect sweep.
    #[must_use = "Sets the staged file sweep threshold"]
    pub const fn temp_max_age(mut self, max_age: Duration) -> Self {
        self.settings.temp_max_age = max_age;
        self
    }

    fn transition<N: Sealed>(self, state: N) -> StoreBuilder<N> {
        StoreBuilder { state, settings: self.settings }
    }
}

impl StoreBuilder<NoRoot> {
    #[must_use = "Creates a new store builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the root directory path for the store"]
    pub fn root(self, path: impl Into<PathBuf>) -> StoreBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }

    /// Applies every field of a deserialized [`StoreConfig`], root included.
    #[must_use = "Applies a store configuration"]
    pub fn config(self, config: &StoreConfig) -> StoreBuilder<WithRoot> {
        self.prefix_length(config.prefix_length)
            .create(config.create)
            .temp_max_age(config.temp_max_age())
            .root(config.root.clone())
    }
}

impl StoreBuilder<WithRoot> {
    /// Consumes the configuration and opens the store.
    ///
    /// Boot sequence:
    /// 1. **Bootstrapping**: creates the root directory if `create(true)` was set.
    /// 2. **Canonicalization**: resolves the root to an absolute physical path.
    /// 3. **Sweep**: removes staged files older than `temp_max_age` left behind by
    ///    crashed writers. Lock markers are never touched here.
    ///
    /// # Errors
    ///
    /// Returns [`DocStoreError::Io`] if the root is missing and `create` is false,
    /// or cannot be created or resolved.
    pub async fn connect(self) -> Result<Store, DocStoreError> {
        let root = &self.state.0;

        if self.settings.create {
            tokio::fs::create_dir_all(root)
                .await
                .context(format!("Failed to bootstrap store root: {}", root.display()))?;
        }

        let canonical = tokio::fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve store root: {}", root.display()))?;

        maintenance::sweep_staged(&canonical, self.settings.temp_max_age).await;
        Ok(self.finish(canonical))
    }

    /// Blocking counterpart of [`Self::connect`] for callers without a runtime.
    ///
    /// # Errors
    ///
    /// Same as [`Self::connect`].
    pub fn connect_blocking(self) -> Result<Store, DocStoreError> {
        let root = &self.state.0;

        if self.settings.create {
            std::fs::create_dir_all(root)
                .context(format!("Failed to bootstrap store root: {}", root.display()))?;
        }

        let canonical = std::fs::canonicalize(root)
            .context(format!("Failed to resolve store root: {}", root.display()))?;

        maintenance::sweep_staged_blocking(&canonical, self.settings.temp_max_age);
        Ok(self.finish(canonical))
    }

    fn finish(self, root: PathBuf) -> Store {
        info!(
            root = %root.display(),
            prefix_length = self.settings.prefix_length,
            "Document store opened"
        );
        Store {
            inner: Arc::new(StoreInner {
                root,
                prefix_length: self.settings.prefix_length,
                temp_max_age: self.settings.temp_max_age,
            }),
        }
    }

    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.state.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_sets_every_field() {
        let cfg = StoreConfig {
            root: PathBuf::from("/x"),
            prefix_length: 3,
            create: false,
            temp_max_age_secs: 9,
        };
        let builder = StoreBuilder::new().config(&cfg);
        assert_eq!(builder.root_path(), Path::new("/x"));
        assert_eq!(builder.settings.prefix_length, 3);
        assert!(!builder.settings.create);
        assert_eq!(builder.settings.temp_max_age, Duration::from_secs(9));
    }

    #[test]
    fn missing_root_without_create_fails() {
        let tmp = TempDir::new().unwrap();
        let err = StoreBuilder::new()
            .root(tmp.path().join("nope"))
            .create(false)
            .connect_blocking()
            .unwrap_err();
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn connect_bootstraps_nested_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("a").join("b");
        let store = StoreBuilder::new().root(&root).connect().await.unwrap();
        assert!(root.is_dir());
        assert!(store.root().is_absolute());
    }
}

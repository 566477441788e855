use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Deserializable store settings, typically a `[store]` table of an app config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding all document directories.
    pub root: PathBuf,
    /// Characters of the key used as a shard directory; `0` disables sharding.
    pub prefix_length: usize,
    /// Create the root on connect if it is missing.
    pub create: bool,
    /// Staged files older than this are swept on connect.
    pub temp_max_age_secs: u64,
}

impl StoreConfig {
    #[must_use]
    pub const fn temp_max_age(&self) -> Duration {
        Duration::from_secs(self.temp_max_age_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("data"), prefix_length: 0, create: true, temp_max_age_secs: 300 }
    }
}

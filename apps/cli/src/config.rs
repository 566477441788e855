use config::{Config, Environment, File};
use fsdocs_logger::LogConfig;
use fsdocs_store::StoreConfig;
use serde::Deserialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

const DEFAULT_FILE: &str = "fsdocs";
const ENV_PREFIX: &str = "FSDOCS";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

trait ConfigErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, ConfigError>;
}

impl<T> ConfigErrorExt<T> for Result<T, config::ConfigError> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, ConfigError> {
        self.map_err(|source| ConfigError::Config { source, context: Some(context.into()) })
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

/// Everything the binary reads from its config file and environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    pub(crate) store: StoreConfig,
    pub(crate) log: LogConfig,
}

/// Loads [`CliConfig`] from a file layered under `FSDOCS__` environment variables.
///
/// An explicit `path` must exist; the default `fsdocs.*` file is optional. Nested
/// keys use `__` (e.g. `FSDOCS__STORE__PREFIX_LENGTH=2`). Console logging defaults
/// to `warn` so that command output is not drowned out.
pub(crate) fn load(path: Option<&Path>) -> Result<CliConfig, ConfigError> {
    load_with(path, Environment::with_prefix(ENV_PREFIX))
}

fn load_with(path: Option<&Path>, env: Environment) -> Result<CliConfig, ConfigError> {
    let required = path.is_some();
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_FILE), Path::to_path_buf);

    let builder = Config::builder()
        .set_default("log.level", "warn")
        .context("Failed to set config defaults")?
        .add_source(File::from(path.as_path()).required(required))
        .add_source(env.separator("__").try_parsing(true));

    tracing::debug!(path = %path.display(), required, "Loading config");

    builder
        .build()
        .context(format!("Failed to build config from {}", path.display()))?
        .try_deserialize::<CliConfig>()
        .context("Failed to deserialize config")
}

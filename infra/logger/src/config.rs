use serde::Deserialize;
use std::path::PathBuf;
use tracing_appender::rolling::Rotation;

/// Output encoding shared by the console and file layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Self::MINUTELY,
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

/// Deserializable logging settings, typically the `[log]` table of an app config.
///
/// `level` accepts the usual `tracing` names (`"trace"` through `"error"`, or `"off"`).
/// `filter` takes `RUST_LOG` style directives such as `"fsdocs_store=debug"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub filter: Option<String>,
    pub console: bool,
    pub format: LogFormat,
    /// Rolling log files are written here when set.
    pub directory: Option<PathBuf>,
    pub rotation: LogRotation,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            filter: None,
            console: true,
            format: LogFormat::default(),
            directory: None,
            rotation: LogRotation::default(),
            max_files: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_log_compact_to_console() {
        let cfg = LogConfig::default();
        assert_eq!(cfg.level, "info");
        assert!(cfg.console);
        assert_eq!(cfg.format, LogFormat::Compact);
        assert!(cfg.directory.is_none());
        assert_eq!(cfg.max_files, 10);
    }

    #[test]
    fn lowercase_enums_deserialize() {
        let cfg: LogConfig = serde_json::from_value(json!({
            "format": "json",
            "rotation": "hourly",
            "directory": "logs",
        }))
        .unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.rotation, LogRotation::Hourly);
        assert_eq!(cfg.directory, Some(PathBuf::from("logs")));
        assert_eq!(Rotation::from(cfg.rotation), Rotation::HOURLY);
    }
}

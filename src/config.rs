use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use vigil_logs::{LineClassifier, StructuredClassifier, WebLogClassifier, WebLogKind};
use vigil_presence::DEFAULT_HEARTBEAT;

/// Top-level configuration, usually loaded from a TOML file.
///
/// ```toml
/// presence_heartbeat = 60
/// log_path = "/var/log/vigil.log"
///
/// [[logs]]
/// path = "/var/log/myapp/service.log"
/// error_timeout = 1800
///
/// [[logs]]
/// path = "/var/log/apache2/access.log"
/// name = "access"
/// format = "web-access"
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Seconds between forced presence re-broadcasts
    #[serde(default = "default_heartbeat")]
    pub presence_heartbeat: i64,

    /// Seconds to pause after a failed cycle
    #[serde(default = "default_backoff")]
    pub backoff: u64,

    /// The bot's own operational log; watched like any other source
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Display name of the bot's own log
    #[serde(default = "default_log_name")]
    pub log_name: String,

    /// Error expiry applied to the bot's own log
    pub log_error_timeout: Option<i64>,

    /// Additional sources to watch
    #[serde(default)]
    pub logs: Vec<LogConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            presence_heartbeat: default_heartbeat(),
            backoff: default_backoff(),
            log_path: default_log_path(),
            log_name: default_log_name(),
            log_error_timeout: None,
            logs: Vec::new(),
        }
    }
}

/// One watched source
#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    pub path: PathBuf,

    /// Display name; defaults to the file's base name
    pub name: Option<String>,

    /// Seconds before an error stops being reported (default 3600)
    pub error_timeout: Option<i64>,

    /// Line dialect of this source
    #[serde(default)]
    pub format: LogFormat,
}

/// Supported line dialects
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// `timestamp,millis - source - LEVEL - message`
    #[default]
    Standard,
    /// Web-server access log: request lines, classified INFO
    WebAccess,
    /// Web-server error log, classified ERROR
    WebError,
}

impl LogFormat {
    /// Classifier instance for this dialect
    pub fn classifier(self) -> Box<dyn LineClassifier> {
        match self {
            Self::Standard => Box::new(StructuredClassifier),
            Self::WebAccess => Box::new(WebLogClassifier::new(WebLogKind::Access)),
            Self::WebError => Box::new(WebLogClassifier::new(WebLogKind::Error)),
        }
    }
}

fn default_heartbeat() -> i64 {
    DEFAULT_HEARTBEAT
}

fn default_backoff() -> u64 {
    5
}

fn default_log_path() -> PathBuf {
    PathBuf::from("/tmp/vigil.log")
}

fn default_log_name() -> String {
    "vigil".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.presence_heartbeat, 60);
        assert_eq!(config.log_name, "vigil");
        assert!(config.logs.is_empty());
    }

    #[test]
    fn test_sources_parse_with_dialects() {
        let config: Config = toml::from_str(
            r#"
            presence_heartbeat = 30

            [[logs]]
            path = "/var/log/app/service.log"
            error_timeout = 1800

            [[logs]]
            path = "/var/log/apache2/access.log"
            name = "access"
            format = "web-access"
            "#,
        )
        .unwrap();

        assert_eq!(config.presence_heartbeat, 30);
        assert_eq!(config.logs.len(), 2);
        assert_eq!(config.logs[0].format, LogFormat::Standard);
        assert_eq!(config.logs[0].error_timeout, Some(1800));
        assert_eq!(config.logs[1].name.as_deref(), Some("access"));
        assert_eq!(config.logs[1].format, LogFormat::WebAccess);
    }
}

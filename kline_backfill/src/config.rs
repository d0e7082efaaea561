//! Runtime configuration.
//!
//! Loaded from an optional TOML file where every section and field has a
//! default, then patched from the environment:
//!
//! | variable               | field                |
//! |------------------------|----------------------|
//! | `KLINE_SOURCE_URL`     | `source.base_url`    |
//! | `KLINE_SINK_URL`       | `sink.url`           |
//! | `KLINE_SINK_INDEX`     | `sink.index`         |
//! | `KLINE_SINK_USERNAME`  | `sink.username`      |
//! | `KLINE_SINK_PASSWORD`  | `sink.password`      |
//! | `KLINE_CONCURRENCY`    | `backfill.concurrency` |

use std::{
    fs,
    path::{Path, PathBuf},
};

use nonzero_ext::nonzero;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use shared_utils::env::{EnvVarError, get_env_var_opt, parse_env_var};
use thiserror::Error;

use crate::{
    models::interval::{Interval, IntervalUnit},
    providers::binance_rest::params::MAX_LIMIT,
};

pub const ENV_SOURCE_URL: &str = "KLINE_SOURCE_URL";
pub const ENV_SINK_URL: &str = "KLINE_SINK_URL";
pub const ENV_SINK_INDEX: &str = "KLINE_SINK_INDEX";
pub const ENV_SINK_USERNAME: &str = "KLINE_SINK_USERNAME";
pub const ENV_SINK_PASSWORD: &str = "KLINE_SINK_PASSWORD";
pub const ENV_CONCURRENCY: &str = "KLINE_CONCURRENCY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Env(#[from] EnvVarError),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub backfill: BackfillConfig,
    pub retry: RetryConfig,
    pub sink: SinkConfig,
    pub cursor: CursorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub base_url: String,
    /// Records per page request.
    pub page_limit: u32,
    pub timeout_secs: u64,
    /// Token bucket shared by every symbol in a run.
    pub requests_per_minute: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            page_limit: 500,
            timeout_secs: 10,
            requests_per_minute: 1200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackfillConfig {
    pub interval: Interval,
    pub start: String,
    /// `None` runs open-ended, up to "now" at each poll.
    pub end: Option<String>,
    /// Pause after every n-th request.
    pub pause_every: u64,
    pub pause_ms: u64,
    /// Cap on empty probe pages. Unset: probing stops only at the window end.
    pub max_probe_calls: Option<u64>,
    /// Symbols backfilled at the same time.
    pub concurrency: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            interval: Interval::new(nonzero!(30u32), IntervalUnit::Minute),
            start: "24 hours ago UTC".to_string(),
            end: None,
            pause_every: 3,
            pause_ms: 1000,
            max_probe_calls: None,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "visualanalytics".to_string(),
            username: None,
            password: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CursorConfig {
    /// Where per-symbol cursors live. Unset disables resuming.
    pub dir: Option<PathBuf>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl Config {
    /// Read `path` (or start from defaults), apply environment overrides and
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = get_env_var_opt(ENV_SOURCE_URL) {
            self.source.base_url = url;
        }
        if let Some(url) = get_env_var_opt(ENV_SINK_URL) {
            self.sink.url = url;
        }
        if let Some(index) = get_env_var_opt(ENV_SINK_INDEX) {
            self.sink.index = index;
        }
        if let Some(username) = get_env_var_opt(ENV_SINK_USERNAME) {
            self.sink.username = Some(username);
        }
        if let Some(password) = get_env_var_opt(ENV_SINK_PASSWORD) {
            self.sink.password = Some(SecretString::from(password));
        }
        if let Some(concurrency) = parse_env_var::<usize>(ENV_CONCURRENCY)? {
            self.backfill.concurrency = concurrency;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.base_url.trim().is_empty() {
            return Err(invalid("source.base_url", "must not be empty"));
        }
        if self.source.page_limit == 0 || self.source.page_limit > MAX_LIMIT {
            return Err(invalid("source.page_limit", format!("must be in 1..={MAX_LIMIT}")));
        }
        if self.source.requests_per_minute == 0 {
            return Err(invalid("source.requests_per_minute", "must be at least 1"));
        }
        if self.backfill.pause_every == 0 {
            return Err(invalid("backfill.pause_every", "must be at least 1"));
        }
        if self.backfill.max_probe_calls == Some(0) {
            return Err(invalid("backfill.max_probe_calls", "must be at least 1"));
        }
        if self.backfill.concurrency == 0 {
            return Err(invalid("backfill.concurrency", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(invalid("retry.max_delay_ms", "must not be below base_delay_ms"));
        }
        if self.sink.url.trim().is_empty() {
            return Err(invalid("sink.url", "must not be empty"));
        }
        if self.sink.index.trim().is_empty() {
            return Err(invalid("sink.index", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.source.page_limit, 500);
        assert_eq!(config.backfill.interval.to_string(), "30m");
        assert_eq!(config.backfill.pause_every, 3);
        assert_eq!(config.backfill.end, None);
        assert_eq!(config.backfill.max_probe_calls, None);
        assert_eq!(config.sink.index, "visualanalytics");
        assert!(config.sink.password.is_none());
        assert!(config.cursor.dir.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [backfill]
            interval = "1h"
            end = "now"
            max_probe_calls = 500

            [sink]
            password = "hunter2"

            [cursor]
            dir = "/var/lib/kline"
            "#,
        )
        .unwrap();
        assert_eq!(config.backfill.interval.step_ms(), 3_600_000);
        assert_eq!(config.backfill.end.as_deref(), Some("now"));
        assert_eq!(config.backfill.max_probe_calls, Some(500));
        assert_eq!(config.backfill.start, "24 hours ago UTC");
        assert_eq!(config.cursor.dir, Some(PathBuf::from("/var/lib/kline")));
        assert!(!format!("{:?}", config.sink).contains("hunter2"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            Config::from_toml_str("[backfill]\ninterval = \"5x\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[source]\nlimit = 5"),
            Err(ConfigError::Parse(_))
        ));

        let mut config = Config::default();
        config.source.page_limit = 1001;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "source.page_limit", .. })
        ));

        let mut config = Config::default();
        config.backfill.pause_every = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.backfill.max_probe_calls = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "backfill.max_probe_calls", .. })
        ));

        let mut config = Config::default();
        config.sink.index = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

//! Gateway configuration
//!
//! Built once at startup from CLI flags, an optional TOML file and
//! defaults, then shared read-only with every handler.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use kubelog_logs::DEFAULT_STREAM_TAIL_LINES;

/// Default lines for the legacy whole-namespace tail
pub const DEFAULT_LEGACY_TAIL_LINES: i64 = 20;

/// Default lines for the per-container tail
pub const DEFAULT_TAIL_LINES: i64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Address the gateway binds to
    pub listen: SocketAddr,

    /// Namespace override; resolved from the cluster when unset
    pub namespace: Option<String>,

    /// Shared secret; every route except the probes requires it when set
    pub api_key: Option<String>,

    pub legacy_tail_lines: i64,
    pub tail_lines: i64,

    /// History a push channel is seeded with
    pub stream_tail_lines: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            namespace: None,
            api_key: None,
            legacy_tail_lines: DEFAULT_LEGACY_TAIL_LINES,
            tail_lines: DEFAULT_TAIL_LINES,
            stream_tail_lines: DEFAULT_STREAM_TAIL_LINES,
        }
    }
}

/// Contents of a `--config` TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub listen: Option<SocketAddr>,
    pub namespace: Option<String>,
    pub api_key: Option<String>,
    pub legacy_tail_lines: Option<i64>,
    pub tail_lines: Option<i64>,
    pub stream_tail_lines: Option<i64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Values given on the command line or through the environment
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub listen: Option<SocketAddr>,
    pub namespace: Option<String>,
    pub api_key: Option<String>,
}

impl GatewayConfig {
    /// Merge overrides over the file over defaults
    pub fn resolve(file: FileConfig, overrides: ConfigOverrides) -> Self {
        let defaults = Self::default();

        Self {
            listen: overrides.listen.or(file.listen).unwrap_or(defaults.listen),
            namespace: non_empty(overrides.namespace).or(non_empty(file.namespace)),
            api_key: non_empty(overrides.api_key).or(non_empty(file.api_key)),
            legacy_tail_lines: positive(file.legacy_tail_lines)
                .unwrap_or(defaults.legacy_tail_lines),
            tail_lines: positive(file.tail_lines).unwrap_or(defaults.tail_lines),
            stream_tail_lines: positive(file.stream_tail_lines)
                .unwrap_or(defaults.stream_tail_lines),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn positive(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::resolve(FileConfig::default(), ConfigOverrides::default());
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.legacy_tail_lines, 20);
        assert_eq!(config.tail_lines, 100);
        assert_eq!(config.stream_tail_lines, 100);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_file_values_apply() {
        let file = FileConfig::parse(
            r#"
            listen = "127.0.0.1:9000"
            namespace = "apps"
            api_key = "abc"
            tail_lines = 50
            "#,
        )
        .unwrap();

        let config = GatewayConfig::resolve(file, ConfigOverrides::default());

        assert_eq!(config.listen, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.namespace.as_deref(), Some("apps"));
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.tail_lines, 50);
        assert_eq!(config.legacy_tail_lines, 20);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = FileConfig::parse("api_key = \"from-file\"\nnamespace = \"file-ns\"").unwrap();
        let overrides = ConfigOverrides {
            api_key: Some("from-env".into()),
            namespace: Some("cli-ns".into()),
            ..Default::default()
        };

        let config = GatewayConfig::resolve(file, overrides);

        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.namespace.as_deref(), Some("cli-ns"));
    }

    #[test]
    fn test_empty_key_means_unauthenticated() {
        let overrides = ConfigOverrides {
            api_key: Some(String::new()),
            ..Default::default()
        };
        let config = GatewayConfig::resolve(FileConfig::default(), overrides);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            FileConfig::parse("listen_port = 80"),
            Err(ConfigError::Parse(_))
        ));
    }
}

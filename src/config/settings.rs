use serde::Deserialize;

use crate::utils::constants::DEFAULT_METRICS_PATH;

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
}

/// Delay between document fetch attempts. Absent means retry immediately.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RetryConfig {
    /// will be multiplied by 2 on every attempt until max_delay_ms
    pub base_delay_ms: Option<u64>,
    /// invariant: >= base_delay_ms
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: String,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info".to_owned(), LogFormat::Compact)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

use anyhow::Result;
use clap::ValueEnum;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::settings::{LogFormat, LoggingConfig};
use crate::config::sources::ServiceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match *self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging settings of the service with the command line level applied on top.
pub fn effective_logging(service_config: &ServiceConfig, arg_log_level: Option<LogLevel>) -> LoggingConfig {
    let configured = service_config.settings.logging.clone().unwrap_or_default();
    match arg_log_level {
        Some(level) => LoggingConfig::new(level.as_str().to_owned(), configured.format),
        None => configured,
    }
}

pub fn run(service_config: &ServiceConfig, arg_log_level: Option<LogLevel>) -> Result<()> {
    init_logging(&effective_logging(service_config, arg_log_level));
    Ok(())
}

/// Initialize tracing with the desired config. Later calls are no-ops.
pub fn init_logging(cfg: &LoggingConfig) {
    let env_filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match cfg.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .flatten_event(true)
                .with_ansi(false);

            let _ = registry.with(layer).try_init();
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_timer(UtcTime::rfc_3339())
                .with_ansi(true);

            let _ = registry.with(layer).try_init();
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::proc_loader::parse_config_unvalidated;

    const CONFIG: &str = r#"
settings:
  server: { host: 127.0.0.1, port: "8080" }
  logging: { level: warn, format: json }
sources: []
endpoints: []
"#;

    #[test]
    fn command_line_level_overrides_configured_level() {
        let config = parse_config_unvalidated(CONFIG).unwrap();

        let logging = effective_logging(&config, Some(LogLevel::Debug));
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);

        let logging = effective_logging(&config, None);
        assert_eq!(logging.level, "warn");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(&LoggingConfig::default());
        init_logging(&LoggingConfig::new("not a level [".to_owned(), LogFormat::Json));
    }
}

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::proc_validator;
use crate::config::settings::LoggingConfig;
use crate::config::sources::ServiceConfig;

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&content).await
}

/// Parse, apply defaults and validate. Every validation problem is part of the error.
pub async fn parse_config(content: &str) -> Result<ServiceConfig> {
    let service_config = parse_config_unvalidated(content)?;

    debug!("validation config ...");
    proc_validator::validate_service_config(&service_config)
        .await
        .map_err(|errors| {
            anyhow!(
                "config is not valid, total errors: {}\n{}",
                errors.len(),
                errors.join("\n")
            )
        })?;

    Ok(service_config)
}

/// Expand `${VAR}` / `${VAR:default}`, deserialize and apply defaults.
pub fn parse_config_unvalidated(content: &str) -> Result<ServiceConfig> {
    let expanded = expand_env_vars(content)?;
    let mut service_config: ServiceConfig = serde_yaml::from_str(&expanded)
        .inspect_err(|e| error!("parse config error: {}", e))?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::default());
    }

    Ok(service_config)
}

fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]*))?\}")?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}

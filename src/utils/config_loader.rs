use std::path::Path;

use anyhow::{Context, Result};

use crate::config::proc_loader::file_to_config;
use crate::config::sources::ServiceConfig;

pub async fn run(config_path: &str) -> Result<ServiceConfig> {
    file_to_config(Path::new(config_path))
        .await
        .with_context(|| format!("invalid config {}", config_path))
}

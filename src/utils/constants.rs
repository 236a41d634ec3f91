//! Shared constants

/// Sent with every document request unless a source overrides `User-Agent`.
pub const APP_USER_AGENT: &str = concat!("scrape-api/", env!("CARGO_PKG_VERSION"));

/// Request header carrying the API key secret.
pub const API_KEY_HEADER: &str = "x-api-key";

pub const DEFAULT_CONFIG_PATH: &str = "scrape-api.yaml";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

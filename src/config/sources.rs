use serde::Deserialize;
use std::collections::HashMap;

use crate::config::settings::SettingsConfig;
use crate::content::ValueType;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
    pub sources: Vec<SourceConfig>,
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// ================================
/// Sources
/// ================================
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub caching_enabled: bool,
    #[serde(default)]
    pub caching_lifetime_seconds: u64,
    #[serde(default)]
    pub retries: u32,
    /// 0 disables the request timeout
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub values: Vec<SourceValueConfig>,
}

/// One value extracted from a source document.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceValueConfig {
    pub name: String,
    pub xpath: String,
    #[serde(default)]
    pub strategy: ExtractionStrategy,
    #[serde(default)]
    pub trim: bool,
    pub regex: Option<String>,
    #[serde(default)]
    pub regex_group: usize,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    /// read this attribute instead of the element text
    pub attribute: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// take the first match
    #[default]
    First,
    /// exactly one match required
    Single,
}

/// ================================
/// Endpoints
/// ================================
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EndpointConfig {
    pub name: String,
    pub values: Vec<EndpointValueConfig>,
}

/// Endpoint-visible `name` for `source_value` of `source`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EndpointValueConfig {
    pub name: String,
    pub source: String,
    pub source_value: String,
}

/// ================================
/// HTTP front-end
/// ================================
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ApiKeyConfig {
    pub name: String,
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RouteConfig {
    pub endpoint: String,
    pub path: String,
    /// names of the keys allowed to call the route, empty = public
    #[serde(default)]
    pub api_keys: Vec<String>,
}

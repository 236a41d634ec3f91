//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * settings (server, metrics path, logging level, retry delays)
//!   * sources: names, url, headers, values (xpath and regex compile)
//!   * endpoints: names and (source, source_value) references
//!   * api keys and routes (paths, endpoint and key references)

use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{error, info};
use url::Url;

use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::sources::{
    ApiKeyConfig, EndpointConfig, RouteConfig, ServiceConfig, SourceConfig, SourceValueConfig,
};
use crate::content::XPath;
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);

    if cfg.sources.is_empty() {
        errors.push("config: 'sources' is empty; at least one source required".to_string());
    }

    // source name -> declared value names
    let mut source_values: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (index, source) in cfg.sources.iter().enumerate() {
        validate_source(index, source, &mut errors);

        let values = source.values.iter().map(|v| v.name.as_str()).collect();
        if source_values.insert(source.name.as_str(), values).is_some() {
            errors.push(format!("sources: duplicate source name '{}'", source.name));
        }
    }

    let mut endpoint_names = HashSet::new();
    for endpoint in &cfg.endpoints {
        validate_endpoint(endpoint, &source_values, &mut errors);
        if !endpoint_names.insert(endpoint.name.as_str()) {
            errors.push(format!("endpoints: duplicate endpoint name '{}'", endpoint.name));
        }
    }

    let key_names = validate_api_keys(&cfg.api_keys, &mut errors);
    validate_routes(
        &cfg.routes,
        &endpoint_names,
        &key_names,
        &cfg.settings,
        &mut errors,
    );

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry("settings.retry", retry, errors);
    }

    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.trim().is_empty() {
        errors.push("settings.server.port must not be empty".to_string());
    } else if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be a port number",
            settings.server.port
        ));
    }

    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                path, max, base
            ));
        }
    }
}

/// SOURCE VALIDATION
fn validate_source(index: usize, source: &SourceConfig, errors: &mut Vec<String>) {
    let path = if source.name.trim().is_empty() {
        errors.push(format!("sources[{}]: name cannot be empty", index));
        format!("sources[{}]", index)
    } else {
        format!("sources.{}", source.name)
    };

    match Url::parse(&source.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(format!(
            "{}: url scheme '{}' must be http or https",
            path,
            url.scheme()
        )),
        Err(e) => errors.push(format!("{}: url '{}' is invalid: {}", path, source.url, e)),
    }

    for (key, value) in &source.headers {
        if key.trim().is_empty() {
            errors.push(format!("{}.headers: header name cannot be empty", path));
        } else if http::HeaderName::from_bytes(key.as_bytes()).is_err() {
            errors.push(format!("{}.headers: '{}' is not a valid header name", path, key));
        }
        if value.is_empty() {
            errors.push(format!("{}.headers.{}: value cannot be empty", path, key));
        } else if http::HeaderValue::from_str(value).is_err() {
            errors.push(format!("{}.headers.{}: value is not a valid header value", path, key));
        }
    }

    if source.values.is_empty() {
        errors.push(format!("{}: values must include at least one value", path));
    }

    let mut seen = HashSet::new();
    for value in &source.values {
        if !seen.insert(value.name.as_str()) {
            errors.push(format!("{}: duplicate value name '{}'", path, value.name));
        }
        validate_source_value(&path, value, errors);
    }
}

fn validate_source_value(source_path: &str, value: &SourceValueConfig, errors: &mut Vec<String>) {
    if value.name.trim().is_empty() {
        errors.push(format!("{}.values: value name cannot be empty", source_path));
    }
    let path = format!("{}.values.{}", source_path, value.name);

    if let Err(e) = XPath::compile(&value.xpath) {
        errors.push(format!("{}.xpath '{}': {}", path, value.xpath, e));
    }

    if let Some(pattern) = &value.regex {
        if let Err(e) = Regex::new(pattern) {
            errors.push(format!("{}.regex '{}' does not compile: {}", path, pattern, e));
        }
    }

    if let Some(attribute) = &value.attribute {
        if attribute.trim().is_empty() {
            errors.push(format!("{}.attribute cannot be empty when present", path));
        }
    }
}

/// ENDPOINT VALIDATION
fn validate_endpoint(
    endpoint: &EndpointConfig,
    source_values: &HashMap<&str, HashSet<&str>>,
    errors: &mut Vec<String>,
) {
    if endpoint.name.trim().is_empty() {
        errors.push("endpoints: endpoint name cannot be empty".to_string());
    }
    let path = format!("endpoints.{}", endpoint.name);

    if endpoint.values.is_empty() {
        errors.push(format!("{}: values must include at least one value", path));
    }

    let mut names = HashSet::new();
    let mut references = HashSet::new();
    for value in &endpoint.values {
        if value.name.trim().is_empty() {
            errors.push(format!("{}.values: value name cannot be empty", path));
        }
        if !names.insert(value.name.as_str()) {
            errors.push(format!("{}: duplicate value name '{}'", path, value.name));
        }

        match source_values.get(value.source.as_str()) {
            None => errors.push(format!(
                "{}.values.{}: references unknown source '{}'",
                path, value.name, value.source
            )),
            Some(declared) if !declared.contains(value.source_value.as_str()) => {
                errors.push(format!(
                    "{}.values.{}: source '{}' has no value '{}'",
                    path, value.name, value.source, value.source_value
                ))
            }
            Some(_) => {}
        }

        // one source value maps to one endpoint name
        if !references.insert((value.source.as_str(), value.source_value.as_str())) {
            errors.push(format!(
                "{}.values.{}: '{}.{}' is already exposed by this endpoint",
                path, value.name, value.source, value.source_value
            ));
        }
    }
}

/// API KEYS & ROUTES
fn validate_api_keys<'a>(keys: &'a [ApiKeyConfig], errors: &mut Vec<String>) -> HashSet<&'a str> {
    let mut names = HashSet::new();
    let mut secrets = HashSet::new();
    for key in keys {
        if key.name.trim().is_empty() {
            errors.push("api_keys: key name cannot be empty".to_string());
        }
        if key.secret.trim().is_empty() {
            errors.push(format!("api_keys.{}: secret cannot be empty", key.name));
        }
        if !names.insert(key.name.as_str()) {
            errors.push(format!("api_keys: duplicate key name '{}'", key.name));
        }
        if !secrets.insert(key.secret.as_str()) {
            errors.push(format!("api_keys.{}: secret is shared with another key", key.name));
        }
    }
    names
}

fn validate_routes(
    routes: &[RouteConfig],
    endpoint_names: &HashSet<&str>,
    key_names: &HashSet<&str>,
    settings: &SettingsConfig,
    errors: &mut Vec<String>,
) {
    let mut paths = HashSet::new();
    for route in routes {
        let path = format!("routes['{}']", route.path);

        if !route.path.starts_with('/') {
            errors.push(format!("{}: path must start with '/'", path));
        }
        if route.path.split('/').any(is_capture_segment) {
            errors.push(format!(
                "{}: path must be literal, ':', '*' and '{{...}}' segments are not allowed",
                path
            ));
        }
        if !paths.insert(route.path.as_str()) {
            errors.push(format!("{}: duplicate route path", path));
        }
        if settings.metrics.is_enabled && route.path == settings.metrics.path {
            errors.push(format!("{}: path collides with the metrics path", path));
        }
        if !endpoint_names.contains(route.endpoint.as_str()) {
            errors.push(format!(
                "{}: references unknown endpoint '{}'",
                path, route.endpoint
            ));
        }
        for key in &route.api_keys {
            if !key_names.contains(key.as_str()) {
                errors.push(format!("{}: references unknown api key '{}'", path, key));
            }
        }
    }
}

/// Segments the router would read as a parameter or wildcard.
pub(crate) fn is_capture_segment(segment: &str) -> bool {
    segment.starts_with(':') || segment.starts_with('*') || segment.contains(['{', '}'])
}

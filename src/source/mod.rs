//! A configured origin document and the values extracted from it.

pub mod extract;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::Cacheable;
use crate::config::sources::SourceConfig;
use crate::content::{ExtractionError, HtmlDocument, Value};
use crate::fetch::{FetchDocument, FetchError, HttpFetcher};
use crate::observability::metrics::get_metrics;
pub use extract::{RuleError, ValueRule};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source '{source_name}': value '{value}' is not a valid extraction rule")]
    InvalidRule {
        source_name: String,
        value: String,
        #[source]
        error: RuleError,
    },

    #[error("source '{source_name}': invalid value keys {keys:?}")]
    InvalidValueKeys {
        source_name: String,
        keys: Vec<String>,
    },

    #[error("source '{source_name}': failed to access the html content via http")]
    Fetch {
        source_name: String,
        #[source]
        error: FetchError,
    },

    #[error("source '{source_name}': failed to parse the html content")]
    Parse {
        source_name: String,
        #[source]
        error: ExtractionError,
    },

    #[error("source '{source_name}': failed to extract value '{value}'")]
    Extraction {
        source_name: String,
        value: String,
        #[source]
        error: ExtractionError,
    },
}

/// One configured origin: fetches its document (or reuses the cached one)
/// and extracts named values out of it.
///
/// Calls are serialized per source, so at most one fetch is in flight and a
/// burst of requests against a stale cache refreshes it once.
pub struct Source<F = HttpFetcher> {
    config: SourceConfig,
    rules: HashMap<String, ValueRule>,
    fetcher: Arc<F>,
    document: Cacheable<Arc<HtmlDocument>>,
    lock: Mutex<()>,
}

impl<F: FetchDocument> Source<F> {
    pub fn new(config: SourceConfig, fetcher: Arc<F>) -> Result<Self, SourceError> {
        let mut rules = HashMap::with_capacity(config.values.len());
        for value in &config.values {
            let rule = ValueRule::compile(value).map_err(|error| SourceError::InvalidRule {
                source_name: config.name.clone(),
                value: value.name.clone(),
                error,
            })?;
            rules.insert(value.name.clone(), rule);
        }

        Ok(Self {
            config,
            rules,
            fetcher,
            document: Cacheable::new(),
            lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Values for `names`, all or nothing. Names must be declared and distinct.
    pub async fn get_values<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<HashMap<String, Value>, SourceError> {
        let _guard = self.lock.lock().await;
        self.get_values_locked(names).await
    }

    pub async fn get_value(&self, name: &str) -> Result<Value, SourceError> {
        let _guard = self.lock.lock().await;
        let mut values = self.get_values_locked(&[name]).await?;
        values.remove(name).ok_or_else(|| self.invalid_keys(&[name]))
    }

    async fn get_values_locked<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<HashMap<String, Value>, SourceError> {
        let mut seen = HashSet::with_capacity(names.len());
        let valid = names
            .iter()
            .all(|name| seen.insert(name.as_ref()) && self.rules.contains_key(name.as_ref()));
        if !valid {
            return Err(self.invalid_keys(names));
        }

        let document = self.document().await?;

        let mut values = HashMap::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let Some(rule) = self.rules.get(name) else {
                return Err(self.invalid_keys(names));
            };
            match rule.extract(&document) {
                Ok(value) => {
                    values.insert(name.to_owned(), value);
                }
                Err(error) => {
                    get_metrics()
                        .await
                        .extraction_failures
                        .with_label_values(&[self.name()])
                        .inc();
                    warn!(source = self.name(), value = name, "extraction failed: {error}");
                    return Err(SourceError::Extraction {
                        source_name: self.config.name.clone(),
                        value: name.to_owned(),
                        error,
                    });
                }
            }
        }

        Ok(values)
    }

    /// The cached document when caching is enabled and fresh, a new fetch otherwise.
    async fn document(&self) -> Result<Arc<HtmlDocument>, SourceError> {
        let metrics = get_metrics().await;
        let source_name = self.config.name.as_str();

        if self.config.caching_enabled {
            if let Some(document) = self.document.get().await {
                metrics.document_cache_hits.with_label_values(&[source_name]).inc();
                info!(source = source_name, url = %self.config.url, "cached content used");
                return Ok(document);
            }
        }

        metrics.source_fetch_requests.with_label_values(&[source_name]).inc();
        let start = Instant::now();
        let fetched = self.fetcher.fetch_document(&self.config).await;
        metrics
            .source_fetch_duration
            .with_label_values(&[source_name])
            .observe(start.elapsed().as_secs_f64());

        let text = fetched.map_err(|error| {
            warn!(source = source_name, url = %self.config.url, "fetch failed: {error}");
            metrics
                .source_fetch_failures
                .with_label_values(&[source_name, error.reason()])
                .inc();
            SourceError::Fetch {
                source_name: source_name.to_owned(),
                error,
            }
        })?;

        let document = Arc::new(HtmlDocument::parse(&text).map_err(|error| SourceError::Parse {
            source_name: source_name.to_owned(),
            error,
        })?);

        if self.config.caching_enabled {
            let ttl = Duration::from_secs(self.config.caching_lifetime_seconds);
            self.document.set_with_ttl(Arc::clone(&document), ttl).await;
            debug!(source = source_name, ttl_seconds = ttl.as_secs(), "document cached");
        }

        info!(source = source_name, url = %self.config.url, "request to resource made");
        Ok(document)
    }

    fn invalid_keys<S: AsRef<str>>(&self, names: &[S]) -> SourceError {
        SourceError::InvalidValueKeys {
            source_name: self.config.name.clone(),
            keys: names.iter().map(|name| name.as_ref().to_owned()).collect(),
        }
    }
}

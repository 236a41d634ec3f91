use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info_span, Instrument, Span};

use crate::client::lookup::{EndpointLookup, LookupError};
use crate::config::sources::{EndpointConfig, ServiceConfig, SourceConfig};
use crate::content::{ExtractionError, Value};
use crate::fetch::{FetchDocument, HttpFetcher};
use crate::source::{Source, SourceError};

pub const DEFAULT_CLIENT_NAME: &str = "scrape-api";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("client: endpoint '{endpoint}' references unknown source '{source_name}'")]
    SourceNotFound { endpoint: String, source_name: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("client: source task failed")]
    Join(#[from] JoinError),
}

impl ClientError {
    /// Short machine readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Lookup(LookupError::UnknownEndpoint(_)) => "unknown_endpoint",
            ClientError::Lookup(LookupError::NoMatchingEndpointValue { .. }) => "no_matching_endpoint_value",
            ClientError::SourceNotFound { .. } => "source_not_found",
            ClientError::Source(SourceError::InvalidRule { .. }) => "invalid_rule",
            ClientError::Source(SourceError::InvalidValueKeys { .. }) => "invalid_value_keys",
            ClientError::Source(SourceError::Fetch { error, .. }) => error.reason(),
            ClientError::Source(SourceError::Parse { .. }) => "parse",
            ClientError::Source(SourceError::Extraction { error, .. }) => match error {
                ExtractionError::ElementNotFound(_) => "element_not_found",
                _ => "extraction",
            },
            ClientError::Join(_) => "internal",
        }
    }
}

/// Answers endpoint requests by querying every source the endpoint needs
/// and merging the renamed values into one map.
pub struct ApiClient<F = HttpFetcher> {
    sources: HashMap<String, Arc<Source<F>>>,
    lookup: EndpointLookup,
    span: Span,
}

impl<F> ApiClient<F>
where
    F: FetchDocument + Send + Sync + 'static,
{
    pub fn new(
        sources: Vec<SourceConfig>,
        endpoints: &[EndpointConfig],
        fetcher: Arc<F>,
    ) -> Result<Self, ClientError> {
        Self::named(DEFAULT_CLIENT_NAME, sources, endpoints, fetcher)
    }

    /// Same as [`ApiClient::new`], every log line of the client carries `name`.
    pub fn named(
        name: &str,
        sources: Vec<SourceConfig>,
        endpoints: &[EndpointConfig],
        fetcher: Arc<F>,
    ) -> Result<Self, ClientError> {
        let span = info_span!("api_client", name = %name);

        let sources = sources
            .into_iter()
            .map(|config| {
                let source = Source::new(config, Arc::clone(&fetcher))?;
                Ok((source.name().to_owned(), Arc::new(source)))
            })
            .collect::<Result<HashMap<_, _>, SourceError>>()?;

        let lookup = EndpointLookup::new(endpoints);
        span.in_scope(|| {
            debug!(
                sources = sources.len(),
                endpoints = endpoints.len(),
                "client initialised"
            )
        });

        Ok(Self {
            sources,
            lookup,
            span,
        })
    }

    pub fn from_config(config: &ServiceConfig, fetcher: Arc<F>) -> Result<Self, ClientError> {
        Self::new(config.sources.clone(), &config.endpoints, fetcher)
    }

    /// All values of `endpoint` under their exposed names.
    ///
    /// Sources are queried concurrently; the first failure cancels the
    /// remaining queries and becomes the result.
    pub async fn get(&self, endpoint: &str) -> Result<HashMap<String, Value>, ClientError> {
        self.collect(endpoint)
            .instrument(self.span.clone())
            .await
            .inspect_err(|e| error!(parent: &self.span, endpoint, "endpoint request failed: {e}"))
    }

    async fn collect(&self, endpoint: &str) -> Result<HashMap<String, Value>, ClientError> {
        let wanted = self.lookup.sources_for(endpoint)?;

        let mut join_set = JoinSet::new();
        for (source_name, names) in wanted {
            let source = self
                .sources
                .get(source_name)
                .ok_or_else(|| ClientError::SourceNotFound {
                    endpoint: endpoint.to_owned(),
                    source_name: source_name.clone(),
                })?;

            let source = Arc::clone(source);
            let names = names.clone();
            join_set.spawn(
                async move {
                    let values = source.get_values(&names).await;
                    (source, values)
                }
                .in_current_span(),
            );
        }

        let mut merged = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (source, values) = joined?;
            let values = values?;
            debug!(endpoint, source = source.name(), values = values.len(), "source answered");

            for (source_value, value) in values {
                let exposed = self
                    .lookup
                    .endpoint_rename_of(endpoint, source.name(), &source_value)?;
                merged.insert(exposed.to_owned(), value);
            }
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::tests::common::StaticFetcher;

    const STOCK: &str = r#"<html><body><span id="price">123.45</span><span id="open">120</span></body></html>"#;
    const FX: &str = r#"<html><body><b class="usd">0.91</b></body></html>"#;

    fn config() -> ServiceConfig {
        serde_yaml::from_str(
            r#"
settings:
  server: { host: 127.0.0.1, port: "0" }
sources:
  - name: stock
    url: http://stock.test/quote
    caching_enabled: true
    caching_lifetime_seconds: 60
    values:
      - { name: price, xpath: "//span[@id='price']", type: float }
      - { name: open, xpath: "//span[@id='open']", type: int }
      - { name: missing, xpath: "//table" }
  - name: fx
    url: http://fx.test/rates
    values:
      - { name: usd, xpath: "//b[@class='usd']", type: float }
endpoints:
  - name: quote
    values:
      - { name: last, source: stock, source_value: price }
  - name: overview
    values:
      - { name: last, source: stock, source_value: price }
      - { name: open, source: stock, source_value: open }
      - { name: rate, source: fx, source_value: usd }
  - name: broken
    values:
      - { name: last, source: stock, source_value: price }
      - { name: gone, source: stock, source_value: missing }
  - name: orphan
    values:
      - { name: x, source: nowhere, source_value: y }
"#,
        )
        .unwrap()
    }

    fn client() -> (ApiClient<StaticFetcher>, Arc<StaticFetcher>) {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page("http://stock.test/quote", STOCK)
                .with_page("http://fx.test/rates", FX),
        );
        let client = ApiClient::from_config(&config(), Arc::clone(&fetcher)).unwrap();
        (client, fetcher)
    }

    #[tokio::test]
    async fn single_value_endpoint() {
        let (client, _) = client();

        let values = client.get("quote").await.unwrap();
        assert_eq!(values, HashMap::from([("last".to_owned(), Value::Float(123.45))]));
        assert_eq!(serde_json::to_value(&values).unwrap(), serde_json::json!({ "last": 123.45 }));
    }

    #[tokio::test]
    async fn merges_values_of_several_sources() {
        let (client, _) = client();

        let values = client.get("overview").await.unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values["last"], Value::Float(123.45));
        assert_eq!(values["open"], Value::Int(120));
        assert_eq!(values["rate"], Value::Float(0.91));
    }

    #[tokio::test]
    async fn cached_source_is_fetched_once_across_endpoints() {
        let (client, fetcher) = client();

        client.get("quote").await.unwrap();
        client.get("overview").await.unwrap();
        assert_eq!(fetcher.calls("http://stock.test/quote"), 1);
        assert_eq!(fetcher.calls("http://fx.test/rates"), 1);
    }

    #[tokio::test]
    async fn unknown_endpoint() {
        let (client, _) = client();

        let error = client.get("nope").await.unwrap_err();
        assert!(matches!(error, ClientError::Lookup(LookupError::UnknownEndpoint(_))));
        assert_eq!(error.kind(), "unknown_endpoint");
    }

    #[tokio::test]
    async fn one_failing_value_fails_the_endpoint() {
        let (client, _) = client();

        let error = client.get("broken").await.unwrap_err();
        assert_eq!(error.kind(), "element_not_found");
        assert!(matches!(
            error,
            ClientError::Source(SourceError::Extraction { ref value, .. }) if value == "missing"
        ));
    }

    #[tokio::test]
    async fn missing_source_instance() {
        let (client, fetcher) = client();

        let error = client.get("orphan").await.unwrap_err();
        assert!(matches!(error, ClientError::SourceNotFound { ref source_name, .. } if source_name == "nowhere"));
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_kind_is_the_fetch_reason() {
        let fetcher = Arc::new(StaticFetcher::default());
        let client = ApiClient::named("offline", config().sources, &config().endpoints, fetcher).unwrap();

        let error = client.get("quote").await.unwrap_err();
        assert!(matches!(
            error,
            ClientError::Source(SourceError::Fetch { error: FetchError::EmptyBody, .. })
        ));
        assert_eq!(error.kind(), "empty_body");
    }
}

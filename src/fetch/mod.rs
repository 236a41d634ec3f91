//! Document retrieval: one retried HTTP GET per source, body decoded to text.

pub mod decode;

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, USER_AGENT};
use http::StatusCode;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::settings::RetryConfig;
use crate::config::sources::SourceConfig;
use crate::resilience::retry::RetrySettings;
use crate::utils::constants::APP_USER_AGENT;

pub use decode::decode_http_body;

/// Why a single request attempt did not produce a usable response.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch: invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("fetch: {url} failed after {attempts} attempts")]
    RetriesExceeded {
        url: String,
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    #[error("fetch: failed to read the response body")]
    Body(#[source] reqwest::Error),

    #[error("fetch: the response body is empty")]
    EmptyBody,

    #[error("fetch: unsupported content encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("fetch: failed to decode the {encoding} response body")]
    Decode {
        encoding: String,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Short label used for metrics and error bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::InvalidHeader { .. } => "invalid_header",
            FetchError::RetriesExceeded { .. } => "retries_exceeded",
            FetchError::Body(_) => "body",
            FetchError::EmptyBody => "empty_body",
            FetchError::UnsupportedEncoding(_) => "unsupported_encoding",
            FetchError::Decode { .. } => "decode",
        }
    }
}

/// Retrieves the raw document text of a source.
pub trait FetchDocument {
    fn fetch_document(
        &self,
        config: &SourceConfig,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Fetches documents over HTTP with the source's retry count and the
/// service-wide backoff.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    backoff: Option<RetryConfig>,
}

impl HttpFetcher {
    pub fn new(client: Client, backoff: Option<RetryConfig>) -> Self {
        Self { client, backoff }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Client::new(), None)
    }
}

impl FetchDocument for HttpFetcher {
    async fn fetch_document(&self, config: &SourceConfig) -> Result<String, FetchError> {
        let headers = build_headers(&config.headers)?;
        let retry = RetrySettings::from_config(config.retries, self.backoff.as_ref());

        let response = retry
            .run_with_retry(|attempt| {
                let mut request = self.client.get(&config.url).headers(headers.clone());
                if config.timeout_seconds > 0 {
                    request = request.timeout(Duration::from_secs(config.timeout_seconds));
                }
                debug!(source = %config.name, url = %config.url, attempt, "requesting document");

                async move {
                    let response = request.send().await?;
                    if response.status() != StatusCode::OK {
                        return Err(AttemptError::Status(response.status()));
                    }
                    Ok(response)
                }
            })
            .await
            .map_err(|last| FetchError::RetriesExceeded {
                url: config.url.clone(),
                attempts: retry.attempts,
                last,
            })?;

        let content_encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        debug!(source = %config.name, encoding = %content_encoding, "response content encoding");

        let body = response.bytes().await.map_err(FetchError::Body)?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        decode_http_body(&body, &content_encoding)
    }
}

/// User agent first, configured headers override it.
fn build_headers(configured: &HashMap<String, String>) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::with_capacity(configured.len() + 1);
    headers.insert(USER_AGENT, HeaderValue::from_static(APP_USER_AGENT));

    for (name, value) in configured {
        let invalid = |reason: String| FetchError::InvalidHeader {
            name: name.clone(),
            reason,
        };
        if name.is_empty() {
            return Err(invalid("empty header name".to_owned()));
        }
        if value.is_empty() {
            return Err(invalid("empty header value".to_owned()));
        }
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use std::io::Write;

    fn source(url: String) -> SourceConfig {
        SourceConfig {
            name: "stock".to_owned(),
            url,
            caching_enabled: false,
            caching_lifetime_seconds: 0,
            retries: 0,
            timeout_seconds: 5,
            headers: HashMap::new(),
            values: Vec::new(),
        }
    }

    #[tokio::test]
    async fn sends_user_agent_and_configured_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/quote")
                    .header("user-agent", APP_USER_AGENT)
                    .header("accept-language", "en");
                then.status(200).body("<html>ok</html>");
            })
            .await;

        let mut config = source(server.url("/quote"));
        config.headers.insert("Accept-Language".to_owned(), "en".to_owned());

        let body = HttpFetcher::default().fetch_document(&config).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn configured_user_agent_wins() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/").header("user-agent", "custom/1.0");
                then.status(200).body("<p>x</p>");
            })
            .await;

        let mut config = source(server.url("/"));
        config.headers.insert("User-Agent".to_owned(), "custom/1.0".to_owned());

        HttpFetcher::default().fetch_document(&config).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn gzip_responses_are_decoded() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<span>7</span>").unwrap();
        let compressed = encoder.finish().unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gz");
                then.status(200)
                    .header("content-encoding", "gzip")
                    .body(compressed.clone());
            })
            .await;

        let body = HttpFetcher::default()
            .fetch_document(&source(server.url("/gz")))
            .await
            .unwrap();
        assert_eq!(body, "<span>7</span>");
    }

    #[tokio::test]
    async fn non_200_exhausts_retries() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let mut config = source(server.url("/missing"));
        config.retries = 1;

        let error = HttpFetcher::default().fetch_document(&config).await.unwrap_err();
        match error {
            FetchError::RetriesExceeded { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last, AttemptError::Status(StatusCode::NOT_FOUND)));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/empty");
                then.status(200);
            })
            .await;

        let error = HttpFetcher::default()
            .fetch_document(&source(server.url("/empty")))
            .await
            .unwrap_err();
        assert!(matches!(error, FetchError::EmptyBody));
    }

    #[tokio::test]
    async fn unsupported_encoding_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/br");
                then.status(200).header("content-encoding", "br").body("xx");
            })
            .await;

        let mut config = source(server.url("/br"));
        config.retries = 3;

        let error = HttpFetcher::default().fetch_document(&config).await.unwrap_err();
        assert!(matches!(error, FetchError::UnsupportedEncoding(_)));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_owned(), "v".to_owned());
        assert!(matches!(
            build_headers(&headers),
            Err(FetchError::InvalidHeader { name, .. }) if name == "bad header"
        ));

        let mut headers = HashMap::new();
        headers.insert("X-Empty".to_owned(), String::new());
        assert!(build_headers(&headers).is_err());
    }
}

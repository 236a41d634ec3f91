// An origin that always fails: the fetch is attempted retries + 1 times, then gives up.

#[cfg(test)]
mod test {

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::routing::get;
use http::StatusCode;

use crate::config::settings::RetryConfig;
use crate::fetch::{AttemptError, FetchDocument, FetchError, HttpFetcher};
use crate::source::{Source, SourceError};
use crate::tests::common::{build_reqwest_client, service_config, spawn_axum, Router};

fn failing_origin(counter: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/flaky",
        get(move || {
            let c = counter.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                (StatusCode::INTERNAL_SERVER_ERROR, "down")
            }
        }),
    )
}

fn source_yaml(url: &str) -> String {
    format!(
        r#"
settings:
  server: {{ host: 127.0.0.1, port: "0" }}
sources:
  - name: flaky
    url: {url}
    retries: 2
    values:
      - {{ name: v, xpath: "//p" }}
endpoints: []
"#
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn always_failing_origin_is_tried_three_times() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (handle, addr) = spawn_axum(failing_origin(counter.clone())).await;

    let config = service_config(&source_yaml(&format!("http://{}/flaky", addr)));
    let fetcher = HttpFetcher::new(build_reqwest_client(), None);

    let error = fetcher.fetch_document(&config.sources[0]).await.unwrap_err();
    match error {
        FetchError::RetriesExceeded { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, AttemptError::Status(StatusCode::INTERNAL_SERVER_ERROR)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 3);

    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_origin_surfaces_as_source_fetch_error() {
    // bind and drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = service_config(&source_yaml(&format!("http://{}/flaky", addr)));
    let backoff = RetryConfig {
        base_delay_ms: Some(1),
        max_delay_ms: Some(2),
    };
    let fetcher = Arc::new(HttpFetcher::new(build_reqwest_client(), Some(backoff)));
    let source = Source::new(config.sources[0].clone(), fetcher).unwrap();

    let error = source.get_value("v").await.unwrap_err();
    match error {
        SourceError::Fetch { source_name, error } => {
            assert_eq!(source_name, "flaky");
            assert!(matches!(
                error,
                FetchError::RetriesExceeded { attempts: 3, last: AttemptError::Transport(_), .. }
            ));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

}

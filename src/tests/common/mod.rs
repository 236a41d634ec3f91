// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use reqwest::Client;

use crate::config::sources::{ServiceConfig, SourceConfig};
use crate::fetch::{FetchDocument, FetchError};

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Parse a YAML service config without validation.
pub fn service_config(yaml: &str) -> ServiceConfig {
    crate::config::proc_loader::parse_config_unvalidated(yaml).expect("test config")
}

/// In-memory pages keyed by URL. Unknown URLs answer with an empty body error.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl StaticFetcher {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_owned(), html.to_owned());
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl FetchDocument for StaticFetcher {
    async fn fetch_document(&self, config: &SourceConfig) -> Result<String, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(config.url.clone()).or_default() += 1;
        self.pages.get(&config.url).cloned().ok_or(FetchError::EmptyBody)
    }
}

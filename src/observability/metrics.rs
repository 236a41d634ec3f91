use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide metrics.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Arc::new(Metrics::new().expect("static metric definitions are valid"))
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Source metrics
    pub source_fetch_requests: IntCounterVec,
    pub source_fetch_failures: IntCounterVec,
    pub source_fetch_duration: HistogramVec,
    pub document_cache_hits: IntCounterVec,
    pub extraction_failures: IntCounterVec,

    // Endpoint metrics
    pub endpoint_requests: IntCounterVec,
    pub endpoint_duration: HistogramVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("scrapeapi".into()), None)?;

        let metrics = Self {
            // Source
            source_fetch_requests: IntCounterVec::new(Opts::new("source_fetch_requests_total", "Document fetches by source"), &["source"])?,
            source_fetch_failures: IntCounterVec::new(Opts::new("source_fetch_failures_total", "Document fetch failures by reason"), &["source", "reason"])?,
            source_fetch_duration: HistogramVec::new(HistogramOpts::new("source_fetch_duration_seconds", "Document fetch duration seconds, retries included").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]), &["source"])?,
            document_cache_hits: IntCounterVec::new(Opts::new("document_cache_hits_total", "Requests answered from the cached document"), &["source"])?,
            extraction_failures: IntCounterVec::new(Opts::new("extraction_failures_total", "Value extraction failures by source"), &["source"])?,

            // Endpoint
            endpoint_requests: IntCounterVec::new(Opts::new("endpoint_requests_total", "Endpoint requests by response status"), &["endpoint", "status"])?,
            endpoint_duration: HistogramVec::new(HistogramOpts::new("endpoint_duration_seconds", "Endpoint response time").buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]), &["endpoint"])?,

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Failed configuration validations")?,
            up: IntGauge::new("up", "1 if service is serving")?,

            registry,
        };

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.source_fetch_requests.clone()))?;
        reg.register(Box::new(metrics.source_fetch_failures.clone()))?;
        reg.register(Box::new(metrics.source_fetch_duration.clone()))?;
        reg.register(Box::new(metrics.document_cache_hits.clone()))?;
        reg.register(Box::new(metrics.extraction_failures.clone()))?;
        reg.register(Box::new(metrics.endpoint_requests.clone()))?;
        reg.register(Box::new(metrics.endpoint_duration.clone()))?;
        reg.register(Box::new(metrics.config_validation_errors.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(metrics)
    }
}

use std::sync::Arc;

use axum::routing::get;
use axum::{extract::State, response::IntoResponse, Router};
use http::{header::CONTENT_TYPE, StatusCode};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{error, info};

use crate::config::settings::MetricsConfig;
use crate::server::server::AppState;

#[derive(Clone)]
pub struct MetricsState {
    pub registry: Arc<Registry>,
}

impl MetricsState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn router(&self, metrics_config: &MetricsConfig) -> Router<AppState> {
        let mut router = Router::new();
        if metrics_config.is_enabled {
            info!("served metrics path: {}", metrics_config.path);
            router = router.route(metrics_config.path.as_str(), get(get_metrics));
        }
        router
    }
}

async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics_state.registry.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("failed to encode metrics: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response();
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, encoder.format_type().to_owned())],
        String::from_utf8_lossy(&buffer).into_owned(),
    )
        .into_response()
}

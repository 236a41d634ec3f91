use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::client::lookup::LookupError;
use crate::client::{ApiClient, ClientError};
use crate::config::proc_validator::is_capture_segment;
use crate::config::settings::SettingsConfig;
use crate::config::sources::{RouteConfig, ServiceConfig};
use crate::content::ExtractionError;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::source::SourceError;
use crate::utils::constants::API_KEY_HEADER;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub api_state: ApiState,
}

impl AppState {
    pub fn new(metrics: &Metrics, api_state: ApiState) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            api_state,
        }
    }
}

/// Configured routes, key secrets and the client answering them.
#[derive(Clone)]
pub struct ApiState {
    routes: Arc<HashMap<String, RouteConfig>>,
    /// secret -> key name
    api_keys: Arc<HashMap<String, String>>,
    client: Arc<ApiClient>,
}

impl ApiState {
    pub fn new(service_config: &ServiceConfig, client: Arc<ApiClient>) -> Result<Self> {
        let mut routes = HashMap::new();
        for route in &service_config.routes {
            if route.path.split('/').any(is_capture_segment) {
                return Err(anyhow!(
                    "route path '{}' (endpoint '{}') must be literal",
                    route.path,
                    route.endpoint
                ));
            }
            if routes.insert(route.path.clone(), route.clone()).is_some() {
                return Err(anyhow!(
                    "duplicate route path '{}' (endpoint '{}')",
                    route.path,
                    route.endpoint
                ));
            }
        }

        let api_keys = service_config
            .api_keys
            .iter()
            .map(|key| (key.secret.clone(), key.name.clone()))
            .collect();

        Ok(Self {
            routes: Arc::new(routes),
            api_keys: Arc::new(api_keys),
            client,
        })
    }

    pub fn router(&self) -> Router<AppState> {
        let mut router = Router::new();
        for path in self.routes.keys() {
            info!("served path: {}", path);
            router = router.route(path, get(handle_request_axum));
        }
        router
    }

    /// `Err` carries the rejection status when the request may not use the route.
    fn authorize(&self, route: &RouteConfig, headers: &HeaderMap) -> Result<(), StatusCode> {
        if route.api_keys.is_empty() {
            return Ok(());
        }
        let secret = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        match self.api_keys.get(secret) {
            Some(name) if route.api_keys.contains(name) => Ok(()),
            _ => Err(StatusCode::FORBIDDEN),
        }
    }
}

/// Builds the application router: metrics plus every configured route,
/// with permissive CORS and handler panics answered as 500.
pub fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    let app = Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .merge(state.api_state.router())
        .with_state(state);
    with_middleware(app)
}

fn with_middleware(app: Router) -> Router {
    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("request handler panicked: {}", message);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal")
}

/// Start one Axum server that dispatches on the configured route paths.
pub async fn start(service_config: &ServiceConfig, client: Arc<ApiClient>) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, ApiState::new(service_config, client)?);
    let settings_config = &service_config.settings;

    let app = router(settings_config, state);
    if !app.has_routes() {
        warn!("no routes and no metrics configured, http server not started");
        return Ok(());
    }

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("listening on {}", bind_addr);

    metrics.up.set(1);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    metrics.up.set(0);

    served.context("http server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Unified request handler, dynamic dispatch by path.
async fn handle_request_axum(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let metrics = get_metrics().await;
    let start = Instant::now();

    let api_state = &state.api_state;
    let path = uri.path();
    let Some(route) = api_state.routes.get(path) else {
        return error_response(StatusCode::NOT_FOUND, "not_found");
    };
    let endpoint = route.endpoint.as_str();

    if let Err(status) = api_state.authorize(route, &headers) {
        warn!(endpoint, path, status = status.as_u16(), "request rejected");
        record(metrics, endpoint, status, start);
        let kind = if status == StatusCode::UNAUTHORIZED { "unauthorized" } else { "forbidden" };
        return error_response(status, kind);
    }

    match api_state.client.get(endpoint).await {
        Ok(values) => {
            record(metrics, endpoint, StatusCode::OK, start);
            info!(endpoint, path, elapsed_ms = start.elapsed().as_millis() as u64, "endpoint served");
            (StatusCode::OK, Json(values)).into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            record(metrics, endpoint, status, start);
            error!(
                endpoint,
                path,
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "endpoint failed: {}",
                e
            );
            error_response(status, e.kind())
        }
    }
}

/// Unknown endpoints and values the document no longer contains are 404,
/// upstream failures 502, everything else 500.
pub fn status_for(error: &ClientError) -> StatusCode {
    match error {
        ClientError::Lookup(LookupError::UnknownEndpoint(_)) => StatusCode::NOT_FOUND,
        ClientError::Source(SourceError::Extraction {
            error: ExtractionError::ElementNotFound(_),
            ..
        }) => StatusCode::NOT_FOUND,
        ClientError::Source(SourceError::Fetch { .. }) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn record(metrics: &Metrics, endpoint: &str, status: StatusCode, start: Instant) {
    metrics
        .endpoint_requests
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
    metrics
        .endpoint_duration
        .with_label_values(&[endpoint])
        .observe(start.elapsed().as_secs_f64());
}

fn error_response(status: StatusCode, kind: &str) -> Response {
    (status, Json(json!({ "error": kind }))).into_response()
}

//! HTTP Server
//!
//! Axum-based exposition layer for the exporter.
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with a link to the metrics path
//! - `GET {metrics_path}` - Prometheus metrics in text format (`/metrics` by default)
//! - `GET /healthy` - Liveness probe, always `ok`
//!
//! # Scrape Model
//!
//! There is no background collection loop. Each request to the metrics path
//! gathers the registry, which makes the exporter scrape Sentinel right then.
//! Gathering does blocking socket I/O, so it runs on the blocking thread pool.

use crate::exporter::SentinelExporter;
use crate::metrics::{self, FieldTable};
use crate::options::Options;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::Registry;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    registry: Registry,
    metrics_path: Arc<str>,
}

pub async fn start(options: Options) -> anyhow::Result<()> {
    validate_metrics_path(&options.metrics_path)?;

    let options = Arc::new(options);
    let exporter = SentinelExporter::new(options.clone(), &FieldTable::sentinel())?;
    let registry = build_registry(exporter)?;

    let app = router(registry, &options.metrics_path);

    let addr = listen_address(&options.listen_address);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Metrics server listening on {}", addr);
    info!("Providing metrics at http://{}{}", addr, options.metrics_path);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Registry owning `exporter` and both build-info gauges
pub fn build_registry(exporter: SentinelExporter) -> prometheus::Result<Registry> {
    let registry = Registry::new();
    let namespace = &exporter.options().metrics_namespace;
    let build_info = metrics::build_info_gauge(&format!("{}_exporter", namespace))?;
    let legacy_build_info = metrics::build_info_gauge(namespace)?;
    registry.register(Box::new(exporter))?;
    registry.register(Box::new(build_info))?;
    registry.register(Box::new(legacy_build_info))?;
    Ok(registry)
}

pub fn router(registry: Registry, metrics_path: &str) -> Router {
    let state = AppState {
        registry,
        metrics_path: Arc::from(metrics_path),
    };

    Router::new()
        .route("/", get(root_handler))
        .route(metrics_path, get(metrics_handler))
        .route("/healthy", get(healthy_handler))
        .with_state(state)
}

fn validate_metrics_path(path: &str) -> anyhow::Result<()> {
    if !path.starts_with('/') || path == "/" || path == "/healthy" {
        anyhow::bail!(
            "metrics path must start with '/' and not collide with other routes, got '{}'",
            path
        );
    }
    Ok(())
}

/// Accept the `:9355` shorthand for all interfaces
fn listen_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    Html(format!(
        r#"<html>
<head><title>Redis Sentinel Exporter {version}</title></head>
<body>
<h1>Redis Sentinel Exporter {version}</h1>
<p><a href="{path}">Metrics</a></p>
<p><a href="/healthy">Health</a></p>
</body>
</html>"#,
        version = version,
        path = state.metrics_path
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    match tokio::task::spawn_blocking(move || metrics::render(&registry)).await {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Ok(Err(e)) => {
            error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
        Err(e) => {
            error!("Metrics collection task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Metrics collection task failed".to_string(),
            )
                .into_response()
        }
    }
}

async fn healthy_handler() -> impl IntoResponse {
    "ok"
}

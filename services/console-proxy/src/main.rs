//! Console reverse proxy
//!
//! Single-binary service fronting the security-operations console's
//! upstreams behind one same-origin listener:
//! 1. `/api` (or whatever the route table says) -> application backend
//! 2. `/es` -> Elasticsearch, with server-side basic auth
//! 3. `/tsdb` -> the Prometheus-compatible metrics store
//!
//! The proxy forwards method, headers (minus hop-by-hop), and body, and
//! returns the upstream response verbatim. All credential handling for the
//! console itself lives in the client core, not here.

mod config;
mod metrics;
mod proxy;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::proxy::{ProxyState, Route};

/// Drain timeout for graceful shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    proxy: ProxyState,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit layer bounds in-flight requests at
/// `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(proxy_handler)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting console-proxy");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let listen_addr = config.server.listen_addr;
    let max_connections = config.server.max_connections;
    let routes: Vec<Route> = config.routes.into_iter().map(Route::from_config).collect();

    info!(
        listen_addr = %listen_addr,
        routes = routes.len(),
        prefixes = ?routes.iter().map(|r| r.prefix.as_str()).collect::<Vec<_>>(),
        "configuration loaded"
    );

    let proxy_state = ProxyState {
        client: reqwest::Client::new(),
        routes: Arc::new(routes),
        requests_total: Arc::new(AtomicU64::new(0)),
        errors_total: Arc::new(AtomicU64::new(0)),
        in_flight: Arc::new(AtomicU64::new(0)),
    };

    // Keep a handle for drain observability after the state moves into axum
    let in_flight = proxy_state.in_flight.clone();

    let app_state = AppState {
        proxy: proxy_state,
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, max_connections);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    // Graceful shutdown with drain timeout enforcement:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. axum stops accepting new connections and drains in-flight requests
    // 3. DRAIN_TIMEOUT bounds how long a slow client can block process exit
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    // The drain timer starts at signal receipt, not server start
    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            let remaining = in_flight.load(Ordering::Relaxed);
            warn!(
                remaining,
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("console-proxy stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Health endpoint: process uptime and request counters.
async fn health_handler(State(state): State<AppState>) -> Response {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "requests_total": state.proxy.requests_total.load(Ordering::Relaxed),
        "errors_total": state.proxy.errors_total.load(Ordering::Relaxed),
        "in_flight": state.proxy.in_flight.load(Ordering::Relaxed),
        "routes": state
            .proxy
            .routes
            .iter()
            .map(|r| r.prefix.as_str())
            .collect::<Vec<_>>(),
    });
    (
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.prometheus.render()
}

/// Catch-all: everything that isn't /health or /metrics is proxied.
async fn proxy_handler(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().simple());
    let method = request.method().to_string();
    let started = Instant::now();

    state.proxy.in_flight.fetch_add(1, Ordering::Relaxed);
    let response = proxy::proxy_request(&state.proxy, request, request_id).await;
    state.proxy.in_flight.fetch_sub(1, Ordering::Relaxed);

    metrics::record_request(
        response.status().as_u16(),
        &method,
        started.elapsed().as_secs_f64(),
    );
    response
}

//! `ReplayServer`: Axum HTTP and WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use pitwall_core::{ErrorData, SessionId};
use pitwall_replay::{ReplayError, SessionRegistry};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_REJECTED_TOTAL;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::websocket::session::{SocketTimings, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Running replay sessions.
    pub registry: Arc<SessionRegistry>,
    /// Gateway configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle; `/metrics` answers 404 without one.
    pub metrics: Option<PrometheusHandle>,
}

/// The replay gateway.
pub struct ReplayServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl ReplayServer {
    /// Create a new server over `registry`.
    pub fn new(
        config: ServerConfig,
        registry: Arc<SessionRegistry>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new(config.shutdown_timeout()));
        Self {
            config: Arc::new(config),
            registry,
            shutdown,
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws/replay/{session_id}", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind, start the session sweeper and serve until shutdown.
    ///
    /// The returned task resolves once the listener and the sweeper have
    /// stopped. Sessions keep running until [`stop`](Self::stop).
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "replay server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let gc = self.registry.spawn_gc(token.clone());

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                warn!(error = %e, "server error");
            }
            if let Err(e) = gc.await {
                warn!(error = %e, "session sweeper failed");
            }
            info!("replay server stopped accepting viewers");
        });

        Ok((local_addr, handle))
    }

    /// Stop the listener task returned by [`listen`](Self::listen), then
    /// every session, within the configured shutdown budget.
    pub async fn stop(&self, listener: JoinHandle<()>) -> ShutdownReport {
        self.shutdown.drain(listener, &self.registry).await
    }

    /// Session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        &state.registry,
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

/// GET /ws/replay/{session_id}
///
/// The session is checked before the upgrade so an unknown or unservable
/// session is refused with a plain HTTP status.
async fn ws_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return reject(&ReplayError::SessionClosed("server shutting down".into()));
    }

    let session_id = SessionId::from_raw(session_id);
    if let Err(e) = state.registry.check_session(&session_id).await {
        debug!(%session_id, kind = e.kind(), "handshake refused");
        return reject(&e);
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let connection = state.registry.new_connection(session_id);
    let timings = SocketTimings {
        heartbeat_interval: state.config.heartbeat_interval(),
        heartbeat_timeout: state.config.heartbeat_timeout(),
    };
    let registry = Arc::clone(&state.registry);
    let shutdown = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, connection, registry, timings, shutdown))
}

/// HTTP status used to refuse a handshake.
fn rejection_status(err: &ReplayError) -> StatusCode {
    match err {
        ReplayError::UnknownSession(_) => StatusCode::NOT_FOUND,
        ReplayError::CapacityExceeded(_)
        | ReplayError::TelemetryUnavailable(_)
        | ReplayError::SessionClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn reject(err: &ReplayError) -> Response {
    counter!(WS_REJECTED_TOTAL, "kind" => err.kind()).increment(1);
    let body = ErrorData {
        reason: err.to_string(),
        kind: err.kind().to_string(),
    };
    (rejection_status(err), Json(body)).into_response()
}

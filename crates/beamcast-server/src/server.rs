//! `SignalServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use beamcast_signal::{ConnectionId, Router as SignalRouter};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::ConnectionMap;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The signaling router behind its serialization mutex.
    pub router: Arc<Mutex<SignalRouter>>,
    /// Connected clients.
    pub connections: Arc<ConnectionMap>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
}

/// The signaling server: one Router, one transport binding.
pub struct SignalServer {
    config: Arc<ServerConfig>,
    router: Arc<Mutex<SignalRouter>>,
    connections: Arc<ConnectionMap>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl SignalServer {
    /// Create a new server.
    #[must_use]
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        Self {
            config: Arc::new(config),
            router: Arc::new(Mutex::new(SignalRouter::new())),
            connections: Arc::new(ConnectionMap::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            router: self.router.clone(),
            connections: self.connections.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            config: self.config.clone(),
            metrics: self.metrics.clone(),
        };

        let mut app = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler));

        if let Some(dir) = &self.config.static_dir {
            app = app.fallback_service(ServeDir::new(dir));
        }

        app.layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (port 0 resolves here) and the join handle
    /// of the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "server error");
            }
        });

        info!(addr = %local_addr, "signaling server listening");
        Ok((local_addr, handle))
    }

    /// Stop accepting, close every signaling session, and wait for the
    /// serve task to finish.
    ///
    /// `timeout` bounds the session drain; `None` uses the default.
    pub async fn graceful_shutdown(
        &self,
        serve_task: JoinHandle<()>,
        timeout: Option<std::time::Duration>,
    ) {
        self.shutdown.drain(&self.connections, timeout).await;
        if let Err(e) = serve_task.await {
            tracing::error!(error = %e, "serve task failed during shutdown");
        }
    }

    /// Get the connection map.
    pub fn connections(&self) -> &Arc<ConnectionMap> {
        &self.connections
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

/// GET / — a signaling server has no page of its own.
async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "beamcast signaling server" }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (broadcaster, viewers) = {
        let router = state.router.lock();
        (router.state().has_broadcaster(), router.state().viewer_count())
    };
    let connections = state.connections.len().await;
    let resp = health::health_check(state.start_time, broadcaster, viewers, connections);
    Json(resp)
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// GET /ws — WebSocket upgrade into a signaling session.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let conn_id = ConnectionId::new();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                conn_id,
                state.router.clone(),
                state.connections.clone(),
                state.config.ping_interval(),
                state.config.ping_timeout(),
                state.shutdown.token(),
            )
        })
        .into_response()
}

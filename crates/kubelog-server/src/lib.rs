//! HTTP and websocket gateway for kubelog
//!
//! Serves the request/response routes (health, version, bulk tails,
//! container directory) and the push channel that relays a following log
//! to one client per connection.

mod auth;
mod config;
mod error;
mod routes;
mod ws;


use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use kubelog_k8s::ClusterLogs;
use kubelog_logs::{LogSource, StreamRelay};

pub use auth::{API_KEY_HEADER, AuthGate};
pub use config::{ConfigError, ConfigOverrides, FileConfig, GatewayConfig};
pub use error::ApiError;
pub use routes::parse_tail_lines;

/// State shared by every handler. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    config: Arc<GatewayConfig>,
    auth: AuthGate,
    cluster: Arc<dyn ClusterLogs>,
    relay: StreamRelay,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        cluster: Arc<dyn ClusterLogs>,
        source: Arc<dyn LogSource>,
    ) -> Self {
        let auth = AuthGate::new(config.api_key.clone());
        let relay = StreamRelay::new(source).with_default_tail(config.stream_tail_lines);
        Self {
            config: Arc::new(config),
            auth,
            cluster,
            relay,
        }
    }
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(routes::healthcheck))
        .route("/version", get(routes::version))
        .route("/logs", get(routes::legacy_logs))
        .route("/api/logs/{pod}/{container}", get(routes::tail_logs))
        .route("/api/containers", get(routes::list_containers))
        .route("/ws/logs/{pod}/{container}", get(ws::stream_logs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = state.config.listen;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        namespace = state.cluster.namespace(),
        auth = !state.auth.is_open(),
        "gateway listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

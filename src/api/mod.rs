mod websocket;

pub use websocket::throughput_handler;

use crate::metrics::metrics_route;
use crate::session::SessionCoordinator;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Shared by every connection
#[derive(Clone)]
pub struct AppState {
    pub coordinator: SessionCoordinator,
}

impl AppState {
    pub fn new(coordinator: SessionCoordinator) -> Self {
        Self { coordinator }
    }
}

/// Create the API server with the measurement WebSocket endpoint
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// session needs the client's address.
pub fn create_api_server(coordinator: SessionCoordinator) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/throughput", get(throughput_handler))
        .route("/metrics", metrics_route())
        .with_state(AppState::new(coordinator))
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}

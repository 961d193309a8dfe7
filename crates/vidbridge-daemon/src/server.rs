//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api;
use crate::state::AppState;
use crate::ws;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Logical inputs
        .route("/api/inputs", get(api::list_inputs))
        .route("/api/inputs/{id}", get(api::get_input))
        .route("/api/inputs/{id}/route", post(api::route_input))
        .route("/api/inputs/{id}/refresh", post(api::refresh_input))
        .route("/api/inputs/{id}/controls", post(api::apply_controls))
        .route(
            "/api/inputs/{id}/controls/{control}",
            get(api::get_control).put(api::set_control),
        )
        .route("/api/controls", get(api::list_controls))
        // Bridge devices
        .route("/api/devices", get(api::list_devices))
        .route(
            "/api/devices/{name}",
            get(api::get_device).delete(api::remove_device),
        )
        .route("/api/devices/{name}/stream", post(api::set_stream))
        .route("/api/devices/{name}/timings", get(api::get_timings))
        .route("/api/devices/{name}/standard", get(api::get_standard))
        .route("/api/devices/{name}/format", get(api::get_format))
        .route("/api/devices/{name}/picture/{control}", put(api::set_picture))
        // WebSocket for real-time updates
        .route("/ws", get(ws::websocket_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}

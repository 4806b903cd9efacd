//! Routers HTTP
//!
//! `create_router` arma la aplicación completa; main y los tests de
//! integración usan el mismo router.

pub mod booking_routes;
pub mod estimate_routes;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::cors_from_config;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_from_config(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .nest("/estimate", estimate_routes::create_estimate_router())
        .nest("/bookings", booking_routes::create_booking_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Health check con el backend de almacenamiento en uso
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "storage": state.storage.as_str(),
        "holds": state.hold_backend.as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/set", post(set_handler))
        .route("/control", post(control_handler))
        .route("/add", post(add_handler))
        .route("/subtract", post(subtract_handler))
        .route("/aux", post(aux_handler))
        .route("/speak", post(speak_handler))
        .route("/speak/clear", post(clear_speech_handler))
        .route("/state", get(state_handler))
        .route("/config", get(config_handler))
        .route("/events", get(events_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::StateSnapshot;

/// API response for control endpoints: echoes the accepted action, any parsed
/// seconds value, and the post-operation timer snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub timer: StateSnapshot,
}

impl ControlResponse {
    /// Create a success response for an action without a time argument
    pub fn ok(action: &str, timer: StateSnapshot) -> Self {
        Self {
            status: "ok".to_string(),
            action: action.to_string(),
            seconds: None,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Create a success response echoing the parsed seconds value
    pub fn with_seconds(action: &str, seconds: i64, timer: StateSnapshot) -> Self {
        Self {
            seconds: Some(seconds),
            ..Self::ok(action, timer)
        }
    }
}

/// Error body returned for rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok(uptime: String) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: "1.2.0".to_string(),
            uptime,
        }
    }
}

/// Boundary error: either a validation failure (400, engine untouched) or an
/// internal state failure (500)
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Validation failure for malformed external input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Internal failure accessing shared state
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            timestamp: Utc::now(),
        };
        (self.status, Json(body)).into_response()
    }
}

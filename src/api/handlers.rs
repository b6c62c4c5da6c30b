//! HTTP endpoint handlers
//!
//! The boundary layer: external input is validated here and rejected before
//! it can reach the engine, so engine operations stay total.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, warn};

use crate::{
    config::DisplayConfig,
    state::{AppState, AuxField, EngineEvent, SpeechField, StateSnapshot},
};

use super::responses::{ApiError, ControlResponse, HealthResponse};

#[derive(Debug, Deserialize)]
pub struct TimeQuery {
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct ControlQuery {
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct AuxQuery {
    pub field: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakQuery {
    pub field: String,
    pub custom_text: Option<String>,
}

/// Parse a strict `HH:MM:SS` time string into total seconds.
///
/// Each component must be exactly two digits; anything else is a validation
/// error and never reaches the engine as a partial value.
fn parse_hms(time: &str) -> Result<i64, ApiError> {
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 3
        || !parts
            .iter()
            .all(|p| p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(ApiError::invalid_input(
            "invalid time format: use HH:MM:SS",
        ));
    }
    let mut seconds = 0i64;
    for part in parts {
        let component: i64 = part
            .parse()
            .map_err(|_| ApiError::invalid_input("invalid time format: use HH:MM:SS"))?;
        seconds = seconds * 60 + component;
    }
    Ok(seconds)
}

fn state_error(e: String) -> ApiError {
    error!("State access failed: {}", e);
    ApiError::internal(e)
}

/// Handle POST /set - set the timer duration and stop it
pub async fn set_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimeQuery>,
) -> Result<Json<ControlResponse>, ApiError> {
    let seconds = parse_hms(&query.time)?;
    let snapshot = state.set_timer(seconds).map_err(state_error)?;
    Ok(Json(ControlResponse::with_seconds("set", seconds, snapshot)))
}

/// Handle POST /control - start, pause, or stop the timer
pub async fn control_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ControlQuery>,
) -> Result<Json<ControlResponse>, ApiError> {
    let snapshot = match query.action.as_str() {
        "start" => state.start(),
        "pause" => state.pause(),
        "stop" => state.stop(),
        other => {
            return Err(ApiError::invalid_input(format!(
                "invalid action '{}': use start, pause, or stop",
                other
            )))
        }
    }
    .map_err(state_error)?;
    Ok(Json(ControlResponse::ok(&query.action, snapshot)))
}

/// Handle POST /add - add time to the running total
pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimeQuery>,
) -> Result<Json<ControlResponse>, ApiError> {
    let seconds = parse_hms(&query.time)?;
    let snapshot = state.add_time(seconds).map_err(state_error)?;
    Ok(Json(ControlResponse::with_seconds("add", seconds, snapshot)))
}

/// Handle POST /subtract - subtract time from the running total
pub async fn subtract_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimeQuery>,
) -> Result<Json<ControlResponse>, ApiError> {
    let seconds = parse_hms(&query.time)?;
    let snapshot = state.subtract_time(seconds).map_err(state_error)?;
    Ok(Json(ControlResponse::with_seconds(
        "subtract", seconds, snapshot,
    )))
}

/// Handle POST /aux - replace one of the three aux text slots
pub async fn aux_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuxQuery>,
) -> Result<Json<ControlResponse>, ApiError> {
    let field: AuxField = query.field.parse().map_err(ApiError::invalid_input)?;
    let snapshot = state.set_aux(field, query.text).map_err(state_error)?;
    Ok(Json(ControlResponse::ok("set_aux", snapshot)))
}

/// Handle POST /speak - store a one-shot speech request
pub async fn speak_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SpeakQuery>,
) -> Result<Json<ControlResponse>, ApiError> {
    let field: SpeechField = query.field.parse().map_err(ApiError::invalid_input)?;
    let snapshot = state
        .request_speech(field, query.custom_text)
        .map_err(state_error)?;
    Ok(Json(ControlResponse::ok("speak", snapshot)))
}

/// Handle POST /speak/clear - acknowledge the pending speech request
pub async fn clear_speech_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ControlResponse>, ApiError> {
    let snapshot = state.clear_speech_request().map_err(state_error)?;
    Ok(Json(ControlResponse::ok("clear_speech_request", snapshot)))
}

/// Handle GET /state - pull-mode snapshot of the timer
pub async fn state_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateSnapshot>, ApiError> {
    let snapshot = state.snapshot().map_err(state_error)?;
    Ok(Json(snapshot))
}

/// Handle GET /config - echo the active display configuration
pub async fn config_handler(State(state): State<Arc<AppState>>) -> Json<DisplayConfig> {
    Json(state.config.clone())
}

/// Handle GET /health - health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.get_uptime()))
}

/// Handle GET /events - push transport delivering state and speech events
///
/// Every broadcast becomes a `state` event; derived and manual speech
/// triggers arrive as discrete `trigger_speech` / `speak_request` events.
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let initial = state.snapshot().map_err(state_error)?;
    let rx = state.event_tx.subscribe();

    let updates = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((sse_event(&event), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Push observer lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    // New observers get the current state immediately, as they would on a
    // fresh poll
    let stream = stream::once(async move { sse_event(&EngineEvent::State(initial)) })
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(event: &EngineEvent) -> Event {
    let (name, payload) = match event {
        EngineEvent::State(snapshot) => ("state", serde_json::to_string(snapshot)),
        EngineEvent::TriggerSpeech(trigger) => ("trigger_speech", serde_json::to_string(trigger)),
        EngineEvent::SpeakRequest(trigger) => ("speak_request", serde_json::to_string(trigger)),
    };
    match payload {
        Ok(data) => Event::default().event(name).data(data),
        Err(e) => {
            error!("Failed to encode {} event: {}", name, e);
            Event::default().event(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hms_accepts_strict_shape() {
        assert_eq!(parse_hms("00:05:00").unwrap(), 300);
        assert_eq!(parse_hms("01:00:01").unwrap(), 3601);
        assert_eq!(parse_hms("00:00:00").unwrap(), 0);
        assert_eq!(parse_hms("02:30:15").unwrap(), 9015);
    }

    #[test]
    fn parse_hms_rejects_other_shapes() {
        for input in [
            "", "5", "5:00", "00:05", "0:05:00", "00:5:00", "00:05:0", "aa:bb:cc", "00-05-00",
            "00:05:00:00", " 00:05:00", "-0:05:00",
        ] {
            assert!(parse_hms(input).is_err(), "accepted {:?}", input);
        }
    }
}

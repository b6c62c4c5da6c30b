//! Snapshot and event payloads delivered to display observers

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::config::DisplayConfig;

use super::timer_state::{
    format_hm, format_hms, format_ms, Phase, SpeechField, SpeechRequest, TimerColor, TimerState,
};

/// Immutable read of the timer state at a point in time
///
/// The same shape serves both delivery modes: the pull endpoint returns it on
/// request, the push channel sends it after every mutation and tick. Field
/// names are the wire format consumed by the display page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(rename = "state")]
    pub phase: Phase,
    pub remaining: i64,
    pub remaining_hms: String,
    pub remaining_hm: String,
    pub remaining_ms: String,
    pub color: TimerColor,
    pub top_aux: String,
    pub bottom_aux: String,
    pub middle_aux: String,
    pub pending_speech_request: Option<SpeechRequest>,
    /// Server wall clock (`HH:MM:SS`) so every display shows the same time
    pub current_time: String,
    pub config: DisplayConfig,
}

impl StateSnapshot {
    /// Capture the current timer state together with the active configuration
    pub fn capture(state: &TimerState, config: &DisplayConfig) -> Self {
        Self {
            phase: state.phase,
            remaining: state.remaining_seconds,
            remaining_hms: format_hms(state.remaining_seconds),
            remaining_hm: format_hm(state.remaining_seconds),
            remaining_ms: format_ms(state.remaining_seconds),
            color: TimerColor::classify(
                state.phase,
                state.remaining_seconds,
                config.amber,
                config.red,
            ),
            top_aux: state.top_aux.clone(),
            bottom_aux: state.bottom_aux.clone(),
            middle_aux: state.middle_aux.clone(),
            pending_speech_request: state.pending_speech_request.clone(),
            current_time: Local::now().format("%H:%M:%S").to_string(),
            config: config.clone(),
        }
    }
}

/// Payload of a speech event on the push channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechTrigger {
    pub field: SpeechField,
    pub custom_text: Option<String>,
}

/// Event broadcast to push-mode observers
///
/// Speech events are derived at the transition that causes them and are never
/// stored; only the `state` payload carries the pending request for pull-mode
/// observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Full snapshot, sent once per mutation or tick
    State(StateSnapshot),
    /// Derived announcement (timer start/end, threshold, continuous interval)
    TriggerSpeech(SpeechTrigger),
    /// Explicit speak request from a control surface
    SpeakRequest(SpeechTrigger),
}

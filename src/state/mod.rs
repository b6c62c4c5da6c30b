//! State management module
//!
//! This module contains the timer state machine, the snapshot payloads
//! delivered to observers, and the application state that ties them together.

pub mod app_state;
pub mod snapshot;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use snapshot::{EngineEvent, SpeechTrigger, StateSnapshot};
pub use timer_state::{
    format_hm, format_hms, format_ms, AuxField, Phase, SpeechField, SpeechRequest, TimerColor,
    TimerState,
};

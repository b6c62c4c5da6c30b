//! Timer state structure and pure derived views

use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Timer phase - the three modes of the countdown state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Field a speech request reads aloud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeechField {
    #[default]
    Timer,
    TopAux,
    BottomAux,
    MiddleAux,
    Custom,
}

impl FromStr for SpeechField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timer" => Ok(Self::Timer),
            "top_aux" => Ok(Self::TopAux),
            "bottom_aux" => Ok(Self::BottomAux),
            "middle_aux" => Ok(Self::MiddleAux),
            "custom" => Ok(Self::Custom),
            _ => Err(format!(
                "invalid speech field '{}': use timer, top_aux, bottom_aux, middle_aux, or custom",
                s
            )),
        }
    }
}

/// One of the three auxiliary text slots displayed alongside the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxField {
    Top,
    Bottom,
    Middle,
}

impl FromStr for AuxField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "middle" => Ok(Self::Middle),
            _ => Err(format!("invalid field '{}': use top, bottom, or middle", s)),
        }
    }
}

/// One-shot "read this aloud" signal, held until an observer acknowledges it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub field: SpeechField,
    pub custom_text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Countdown timer state
///
/// `remaining_seconds` is signed and never clamped: a running timer keeps
/// counting below zero so overtime stays visible. Aux texts may contain the
/// literal `\n` marker, which display renderers expand to a line break.
#[derive(Debug, Clone, Default)]
pub struct TimerState {
    pub phase: Phase,
    pub remaining_seconds: i64,
    pub last_set_seconds: i64,
    pub top_aux: String,
    pub bottom_aux: String,
    pub middle_aux: String,
    pub pending_speech_request: Option<SpeechRequest>,
}

impl TimerState {
    /// Create a fresh stopped timer with no time set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn aux(&self, field: AuxField) -> &str {
        match field {
            AuxField::Top => &self.top_aux,
            AuxField::Bottom => &self.bottom_aux,
            AuxField::Middle => &self.middle_aux,
        }
    }

    pub fn set_aux(&mut self, field: AuxField, text: String) {
        match field {
            AuxField::Top => self.top_aux = text,
            AuxField::Bottom => self.bottom_aux = text,
            AuxField::Middle => self.middle_aux = text,
        }
    }
}

/// Display color class for the timer, consumed by display and feedback observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerColor {
    /// No emphasis (stopped, or expired while not running)
    Neutral,
    /// Running with time comfortably remaining
    Green,
    /// Running inside the amber band, or paused
    Amber,
    /// Running inside the red band
    Red,
    /// Running at or past zero - displays blink
    Alert,
}

impl TimerColor {
    /// Classify the timer state against the configured thresholds.
    ///
    /// Rules apply in order; an unset threshold disables that band.
    pub fn classify(phase: Phase, remaining: i64, amber: Option<u32>, red: Option<u32>) -> Self {
        if remaining <= 0 {
            return if phase == Phase::Running {
                Self::Alert
            } else {
                Self::Neutral
            };
        }
        match phase {
            Phase::Running => {
                if red.is_some_and(|t| remaining <= i64::from(t)) {
                    Self::Red
                } else if amber.is_some_and(|t| remaining <= i64::from(t)) {
                    Self::Amber
                } else {
                    Self::Green
                }
            }
            Phase::Paused => Self::Amber,
            Phase::Stopped => Self::Neutral,
        }
    }
}

/// Format seconds as `HH:MM:SS`, with a leading minus for negative values
pub fn format_hms(total_seconds: i64) -> String {
    let (sign, h, m, s) = split_hms(total_seconds);
    format!("{}{:02}:{:02}:{:02}", sign, h, m, s)
}

/// Format seconds as `HH:MM`
pub fn format_hm(total_seconds: i64) -> String {
    let (sign, h, m, _) = split_hms(total_seconds);
    format!("{}{:02}:{:02}", sign, h, m)
}

/// Format seconds as `MM:SS`
pub fn format_ms(total_seconds: i64) -> String {
    let (sign, _, m, s) = split_hms(total_seconds);
    format!("{}{:02}:{:02}", sign, m, s)
}

fn split_hms(total_seconds: i64) -> (&'static str, i64, i64, i64) {
    let sign = if total_seconds < 0 { "-" } else { "" };
    let magnitude = total_seconds.abs();
    (
        sign,
        magnitude / 3600,
        (magnitude % 3600) / 60,
        magnitude % 60,
    )
}

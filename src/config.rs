//! Configuration and CLI argument handling

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::state::SpeechField;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "countdown-server")]
#[command(about = "A state-managed HTTP server for synchronized countdown timer displays")]
#[command(version = "1.2.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "8880")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Amber warning threshold in seconds (omit to disable the band)
    #[arg(long)]
    pub amber_time: Option<u32>,

    /// Red warning threshold in seconds (omit to disable the band)
    #[arg(long)]
    pub red_time: Option<u32>,

    /// Show the server's wall clock on connected displays
    #[arg(long)]
    pub show_internal_time: bool,

    /// Corner placement for the wall clock
    #[arg(long, value_enum, default_value = "top-left")]
    pub time_corner: TimeCorner,

    /// Hide the timer and promote the middle aux field in its place
    #[arg(long)]
    pub hide_timer: bool,

    /// Timer font size hint (vw units)
    #[arg(long, default_value = "15")]
    pub timer_fontsize: u32,

    /// Aux text font size hint (vw units)
    #[arg(long, default_value = "5")]
    pub aux_fontsize: u32,

    /// Enable speech synthesis on connected displays
    #[arg(long)]
    pub enable_speech: bool,

    /// Field read aloud by derived speech triggers
    #[arg(long, value_enum, default_value = "timer")]
    pub speech_field: SpeechField,

    /// Speech rate (0.1 - 3.0)
    #[arg(long, default_value = "1.0")]
    pub speech_rate: f32,

    /// Speech pitch (0.0 - 2.0)
    #[arg(long, default_value = "1.0")]
    pub speech_pitch: f32,

    /// Speech volume (0.0 - 1.0)
    #[arg(long, default_value = "1.0")]
    pub speech_volume: f32,

    /// Speech voice name, or "auto" to let the display pick an English voice
    #[arg(long, default_value = "auto")]
    pub speech_voice: String,

    /// When derived speech triggers fire
    #[arg(long, value_enum, default_value = "manual")]
    pub speech_trigger: SpeechTriggerMode,

    /// Interval in seconds for the continuous speech trigger
    #[arg(long, default_value = "5")]
    pub speech_interval: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Build the validated display configuration from the CLI arguments
    pub fn display_config(&self) -> Result<DisplayConfig, String> {
        let config = DisplayConfig {
            amber: self.amber_time,
            red: self.red_time,
            show_internal_time: self.show_internal_time,
            time_corner: self.time_corner,
            hide_timer: self.hide_timer,
            timer_fontsize: self.timer_fontsize,
            aux_fontsize: self.aux_fontsize,
            enable_speech: self.enable_speech,
            speech_field: self.speech_field,
            speech_rate: self.speech_rate,
            speech_pitch: self.speech_pitch,
            speech_volume: self.speech_volume,
            speech_voice: self.speech_voice.clone(),
            speech_trigger: self.speech_trigger,
            speech_interval: self.speech_interval,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Corner placement choices for the on-screen wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TimeCorner {
    #[default]
    TopLeft,
    TopMiddle,
    TopRight,
    BottomLeft,
    BottomMiddle,
    BottomRight,
}

/// When derived speech triggers fire (manual requests always work)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechTriggerMode {
    /// Only explicit speak requests
    #[default]
    Manual,
    /// Announce when the timer starts
    TimerStart,
    /// Announce when the timer reaches zero
    TimerEnd,
    /// Announce when the amber or red threshold is crossed
    Warnings,
    /// Announce every `speech_interval` seconds while running
    Continuous,
}

/// Active display configuration, validated once at startup
///
/// Echoed verbatim in every state snapshot so displays stay in sync with the
/// server rather than carrying their own settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub amber: Option<u32>,
    pub red: Option<u32>,
    pub show_internal_time: bool,
    pub time_corner: TimeCorner,
    pub hide_timer: bool,
    pub timer_fontsize: u32,
    pub aux_fontsize: u32,
    pub enable_speech: bool,
    pub speech_field: SpeechField,
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub speech_volume: f32,
    pub speech_voice: String,
    pub speech_trigger: SpeechTriggerMode,
    pub speech_interval: u32,
}

impl DisplayConfig {
    /// Check every recognized option once, so the rest of the system can
    /// consume the configuration without re-validating
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(amber), Some(red)) = (self.amber, self.red) {
            if red > amber {
                return Err(format!(
                    "red threshold ({}s) must not exceed amber threshold ({}s)",
                    red, amber
                ));
            }
        }
        if self.timer_fontsize == 0 || self.aux_fontsize == 0 {
            return Err("font sizes must be at least 1".to_string());
        }
        if !(0.1..=3.0).contains(&self.speech_rate) {
            return Err(format!(
                "speech rate {} out of range (0.1 - 3.0)",
                self.speech_rate
            ));
        }
        if !(0.0..=2.0).contains(&self.speech_pitch) {
            return Err(format!(
                "speech pitch {} out of range (0.0 - 2.0)",
                self.speech_pitch
            ));
        }
        if !(0.0..=1.0).contains(&self.speech_volume) {
            return Err(format!(
                "speech volume {} out of range (0.0 - 1.0)",
                self.speech_volume
            ));
        }
        if self.speech_interval == 0 {
            return Err("speech interval must be at least 1 second".to_string());
        }
        Ok(())
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            amber: Some(180),
            red: Some(60),
            show_internal_time: false,
            time_corner: TimeCorner::TopLeft,
            hide_timer: false,
            timer_fontsize: 15,
            aux_fontsize: 5,
            enable_speech: false,
            speech_field: SpeechField::Timer,
            speech_rate: 1.0,
            speech_pitch: 1.0,
            speech_volume: 1.0,
            speech_voice: "auto".to_string(),
            speech_trigger: SpeechTriggerMode::Manual,
            speech_interval: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DisplayConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_red_above_amber() {
        let config = DisplayConfig {
            amber: Some(60),
            red: Some(180),
            ..DisplayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unset_thresholds_are_valid() {
        let config = DisplayConfig {
            amber: None,
            red: Some(600),
            ..DisplayConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_speech_settings() {
        let rate = DisplayConfig {
            speech_rate: 5.0,
            ..DisplayConfig::default()
        };
        assert!(rate.validate().is_err());

        let volume = DisplayConfig {
            speech_volume: 1.5,
            ..DisplayConfig::default()
        };
        assert!(volume.validate().is_err());

        let interval = DisplayConfig {
            speech_interval: 0,
            ..DisplayConfig::default()
        };
        assert!(interval.validate().is_err());
    }
}

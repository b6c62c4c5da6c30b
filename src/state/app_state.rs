//! Main application state: the timer engine and its broadcast channel

use std::{
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Instant,
};

use chrono::Utc;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info};

use crate::{
    config::{DisplayConfig, SpeechTriggerMode},
    tasks::ticker_task,
};

use super::{
    snapshot::{EngineEvent, SpeechTrigger, StateSnapshot},
    timer_state::{AuxField, Phase, SpeechField, SpeechRequest, TimerState},
};

/// Timer state plus the handle of the tick driver that mutates it.
///
/// Both live under one lock so `phase == Running` and "a tick driver exists"
/// change together; a driver can never be orphaned by an interleaved
/// transition.
#[derive(Debug)]
struct TimerCore {
    state: TimerState,
    ticker: Option<JoinHandle<()>>,
}

/// Owns the single timer instance and notifies observers of every change
#[derive(Debug)]
pub struct AppState {
    core: Mutex<TimerCore>,
    /// Active configuration, validated at startup and echoed in snapshots
    pub config: DisplayConfig,
    /// Server metadata
    pub start_time: Instant,
    /// Channel for push-mode state and speech events
    pub event_tx: broadcast::Sender<EngineEvent>,
    /// Self-handle for handing the tick driver an owner reference
    self_handle: Weak<AppState>,
}

impl AppState {
    /// Create a new AppState with a stopped timer
    pub fn new(config: DisplayConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(100);

        Arc::new_cyclic(|weak| Self {
            core: Mutex::new(TimerCore {
                state: TimerState::new(),
                ticker: None,
            }),
            config,
            start_time: Instant::now(),
            event_tx,
            self_handle: weak.clone(),
        })
    }

    fn lock_core(&self) -> Result<MutexGuard<'_, TimerCore>, String> {
        self.core
            .lock()
            .map_err(|e| format!("Failed to lock timer state: {}", e))
    }

    /// Events are published while the state lock is held, so observers see
    /// broadcasts in mutation order, each reflecting the state after its own
    /// mutation. Send only fails when no push observer is subscribed.
    fn publish(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Set the timer to a new duration and stop it
    pub fn set_timer(&self, seconds: i64) -> Result<StateSnapshot, String> {
        let mut core = self.lock_core()?;
        if let Some(ticker) = core.ticker.take() {
            ticker.abort();
        }
        core.state.phase = Phase::Stopped;
        core.state.remaining_seconds = seconds;
        core.state.last_set_seconds = seconds;

        info!("Timer set to {}s", seconds);
        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot.clone()));
        Ok(snapshot)
    }

    /// Start or resume the countdown, installing the tick driver
    pub fn start(&self) -> Result<StateSnapshot, String> {
        let mut core = self.lock_core()?;
        if core.state.is_running() {
            // Duplicate control signal; keep the existing tick driver
            return Ok(StateSnapshot::capture(&core.state, &self.config));
        }
        let Some(engine) = self.self_handle.upgrade() else {
            return Err("Engine is being torn down".to_string());
        };
        core.state.phase = Phase::Running;

        // The engine owns at most one driver handle; a stale one here would
        // mean a transition left it behind, so cancel it before replacing.
        let ticker = tokio::spawn(ticker_task(engine));
        if let Some(stale) = core.ticker.replace(ticker) {
            stale.abort();
        }

        info!(
            "Timer started with {}s remaining",
            core.state.remaining_seconds
        );
        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot.clone()));
        if self.config.enable_speech
            && self.config.speech_trigger == SpeechTriggerMode::TimerStart
        {
            self.publish(EngineEvent::TriggerSpeech(SpeechTrigger {
                field: self.config.speech_field,
                custom_text: None,
            }));
        }
        Ok(snapshot)
    }

    /// Pause the countdown, cancelling the tick driver and keeping the
    /// remaining time
    pub fn pause(&self) -> Result<StateSnapshot, String> {
        let mut core = self.lock_core()?;
        if !core.state.is_running() {
            // Pause only applies to a running timer
            return Ok(StateSnapshot::capture(&core.state, &self.config));
        }
        if let Some(ticker) = core.ticker.take() {
            ticker.abort();
        }
        core.state.phase = Phase::Paused;

        info!("Timer paused at {}s remaining", core.state.remaining_seconds);
        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot.clone()));
        Ok(snapshot)
    }

    /// Stop the countdown and restore the last manually set duration.
    ///
    /// Stop means "return to the last configured time", not "clear the
    /// timer".
    pub fn stop(&self) -> Result<StateSnapshot, String> {
        let mut core = self.lock_core()?;
        if let Some(ticker) = core.ticker.take() {
            ticker.abort();
        }
        core.state.phase = Phase::Stopped;
        core.state.remaining_seconds = core.state.last_set_seconds;

        info!("Timer stopped, reset to {}s", core.state.remaining_seconds);
        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot.clone()));
        Ok(snapshot)
    }

    /// Apply one countdown decrement.
    ///
    /// Returns `Ok(false)` without touching the state when the timer is no
    /// longer running: a tick from a driver cancelled mid-flight must be
    /// discarded, never applied.
    pub fn tick(&self) -> Result<bool, String> {
        let mut core = self.lock_core()?;
        if !core.state.is_running() {
            return Ok(false);
        }
        let previous = core.state.remaining_seconds;
        core.state.remaining_seconds -= 1;

        debug!("Tick: {}s remaining", core.state.remaining_seconds);
        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot));
        self.tick_speech_triggers(previous, core.state.remaining_seconds);
        Ok(true)
    }

    /// Add seconds to the remaining time without touching phase or the last
    /// set duration
    pub fn add_time(&self, seconds: i64) -> Result<StateSnapshot, String> {
        self.adjust_time(seconds)
    }

    /// Subtract seconds from the remaining time; symmetric to `add_time`
    pub fn subtract_time(&self, seconds: i64) -> Result<StateSnapshot, String> {
        self.adjust_time(-seconds)
    }

    fn adjust_time(&self, delta: i64) -> Result<StateSnapshot, String> {
        let mut core = self.lock_core()?;
        core.state.remaining_seconds += delta;

        info!(
            "Adjusted timer by {}s, now {}s remaining",
            delta, core.state.remaining_seconds
        );
        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot.clone()));
        Ok(snapshot)
    }

    /// Replace one of the three aux text slots
    pub fn set_aux(&self, field: AuxField, text: String) -> Result<StateSnapshot, String> {
        let mut core = self.lock_core()?;
        core.state.set_aux(field, text);

        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot.clone()));
        Ok(snapshot)
    }

    /// Record a one-shot speech request and notify push observers.
    ///
    /// The request stays pending until `clear_speech_request` acknowledges
    /// it, so pull-mode observers polling snapshots will keep seeing it.
    pub fn request_speech(
        &self,
        field: SpeechField,
        custom_text: Option<String>,
    ) -> Result<StateSnapshot, String> {
        let mut core = self.lock_core()?;
        core.state.pending_speech_request = Some(SpeechRequest {
            field,
            custom_text: custom_text.clone(),
            timestamp: Utc::now(),
        });

        debug!("Speech request stored: {:?}", field);
        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot.clone()));
        self.publish(EngineEvent::SpeakRequest(SpeechTrigger {
            field,
            custom_text,
        }));
        Ok(snapshot)
    }

    /// Acknowledge and clear the pending speech request
    pub fn clear_speech_request(&self) -> Result<StateSnapshot, String> {
        let mut core = self.lock_core()?;
        core.state.pending_speech_request = None;

        let snapshot = StateSnapshot::capture(&core.state, &self.config);
        self.publish(EngineEvent::State(snapshot.clone()));
        Ok(snapshot)
    }

    /// Take a point-in-time snapshot for pull-mode observers
    pub fn snapshot(&self) -> Result<StateSnapshot, String> {
        let core = self.lock_core()?;
        Ok(StateSnapshot::capture(&core.state, &self.config))
    }

    /// Check whether a tick driver is currently installed
    pub fn has_tick_driver(&self) -> Result<bool, String> {
        let core = self.lock_core()?;
        Ok(core.ticker.is_some())
    }

    /// Cancel the tick driver during engine teardown
    pub fn shutdown(&self) {
        if let Ok(mut core) = self.core.lock() {
            if let Some(ticker) = core.ticker.take() {
                ticker.abort();
                info!("Tick driver cancelled on shutdown");
            }
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Derived speech announcements tied to tick transitions, emitted once
    /// per triggering transition and never stored
    fn tick_speech_triggers(&self, previous: i64, remaining: i64) {
        if !self.config.enable_speech {
            return;
        }
        let crossed = |threshold: Option<u32>| {
            threshold.is_some_and(|t| previous > i64::from(t) && remaining <= i64::from(t))
        };
        let fire = match self.config.speech_trigger {
            SpeechTriggerMode::TimerEnd => previous > 0 && remaining <= 0,
            SpeechTriggerMode::Warnings => crossed(self.config.amber) || crossed(self.config.red),
            SpeechTriggerMode::Continuous => {
                remaining.rem_euclid(i64::from(self.config.speech_interval)) == 0
            }
            SpeechTriggerMode::Manual | SpeechTriggerMode::TimerStart => false,
        };
        if fire {
            self.publish(EngineEvent::TriggerSpeech(SpeechTrigger {
                field: self.config.speech_field,
                custom_text: None,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerColor;
    use tokio::sync::broadcast::error::TryRecvError;

    fn test_state() -> Arc<AppState> {
        AppState::new(DisplayConfig::default())
    }

    fn speech_state(trigger: SpeechTriggerMode) -> Arc<AppState> {
        AppState::new(DisplayConfig {
            enable_speech: true,
            speech_trigger: trigger,
            ..DisplayConfig::default()
        })
    }

    /// phase == Running if and only if a tick driver is installed
    fn assert_driver_invariant(state: &AppState) {
        let running = state.snapshot().unwrap().phase == Phase::Running;
        assert_eq!(state.has_tick_driver().unwrap(), running);
    }

    fn drain_states(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<StateSnapshot> {
        let mut snapshots = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(EngineEvent::State(s)) => snapshots.push(s),
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(e) => panic!("unexpected channel error: {}", e),
            }
        }
        snapshots
    }

    #[tokio::test]
    async fn running_iff_tick_driver_installed() {
        let state = test_state();
        assert_driver_invariant(&state);

        state.set_timer(10).unwrap();
        assert_driver_invariant(&state);

        state.start().unwrap();
        assert_driver_invariant(&state);

        state.pause().unwrap();
        assert_driver_invariant(&state);

        state.start().unwrap();
        assert_driver_invariant(&state);

        state.add_time(5).unwrap();
        assert_driver_invariant(&state);

        state.stop().unwrap();
        assert_driver_invariant(&state);

        state.subtract_time(3).unwrap();
        assert_driver_invariant(&state);
    }

    #[tokio::test]
    async fn countdown_pause_stop_scenario() {
        let state = test_state();
        state.set_timer(300).unwrap();
        state.start().unwrap();
        for _ in 0..5 {
            assert!(state.tick().unwrap());
        }

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.remaining, 295);
        assert_eq!(snapshot.phase, Phase::Running);

        let paused = state.pause().unwrap();
        assert_eq!(paused.remaining, 295);
        assert_eq!(paused.phase, Phase::Paused);

        // A tick arriving after pause is discarded, never applied
        assert!(!state.tick().unwrap());
        assert_eq!(state.snapshot().unwrap().remaining, 295);

        let stopped = state.stop().unwrap();
        assert_eq!(stopped.remaining, 300);
        assert_eq!(stopped.phase, Phase::Stopped);
        assert_driver_invariant(&state);
    }

    #[tokio::test]
    async fn stop_restores_last_set_time_from_overtime() {
        let state = test_state();
        state.set_timer(5).unwrap();
        state.start().unwrap();
        for _ in 0..7 {
            state.tick().unwrap();
        }
        assert_eq!(state.snapshot().unwrap().remaining, -2);

        let stopped = state.stop().unwrap();
        assert_eq!(stopped.remaining, 5);
        assert_eq!(stopped.phase, Phase::Stopped);
    }

    #[tokio::test]
    async fn tick_outside_running_is_discarded() {
        let state = test_state();
        state.set_timer(10).unwrap();
        assert!(!state.tick().unwrap());
        assert_eq!(state.snapshot().unwrap().remaining, 10);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let state = test_state();
        state.set_timer(60).unwrap();
        let mut rx = state.event_tx.subscribe();

        state.start().unwrap();
        state.start().unwrap();

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.phase, Phase::Running);
        assert_driver_invariant(&state);

        // The duplicate start is a no-op and must not broadcast
        assert_eq!(drain_states(&mut rx).len(), 1);
        state.stop().unwrap();
    }

    #[tokio::test]
    async fn adjusting_time_preserves_phase_and_last_set() {
        let state = test_state();
        state.set_timer(100).unwrap();

        let added = state.add_time(60).unwrap();
        assert_eq!(added.remaining, 160);
        assert_eq!(added.phase, Phase::Stopped);

        let subtracted = state.subtract_time(30).unwrap();
        assert_eq!(subtracted.remaining, 130);

        // last_set is untouched, so stop still restores the set duration
        let stopped = state.stop().unwrap();
        assert_eq!(stopped.remaining, 100);
    }

    #[tokio::test]
    async fn overtime_counts_negative_and_alerts() {
        let state = test_state();
        state.set_timer(2).unwrap();
        state.start().unwrap();
        for _ in 0..3 {
            state.tick().unwrap();
        }

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.remaining, -1);
        assert_eq!(snapshot.phase, Phase::Running);
        assert_eq!(snapshot.color, TimerColor::Alert);
        assert_eq!(snapshot.remaining_hms, "-00:00:01");
        state.stop().unwrap();
    }

    #[tokio::test]
    async fn speech_request_stays_pending_until_cleared() {
        let state = test_state();
        state.request_speech(SpeechField::Timer, None).unwrap();

        let first = state.snapshot().unwrap();
        let request = first.pending_speech_request.expect("request pending");
        assert_eq!(request.field, SpeechField::Timer);

        // A second snapshot before acknowledgment still shows the request
        assert!(state.snapshot().unwrap().pending_speech_request.is_some());

        state.clear_speech_request().unwrap();
        assert!(state.snapshot().unwrap().pending_speech_request.is_none());
    }

    #[tokio::test]
    async fn broadcasts_reflect_post_mutation_state_in_order() {
        let state = test_state();
        let mut rx = state.event_tx.subscribe();

        state.set_timer(120).unwrap();
        state.add_time(5).unwrap();

        let snapshots = drain_states(&mut rx);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].remaining, 120);
        assert_eq!(snapshots[0].phase, Phase::Stopped);
        assert_eq!(snapshots[1].remaining, 125);
    }

    #[tokio::test]
    async fn guarded_noops_do_not_broadcast() {
        let state = test_state();
        state.set_timer(60).unwrap();
        let mut rx = state.event_tx.subscribe();

        // Pausing a stopped timer is a guarded no-op
        state.pause().unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn manual_speak_emits_one_push_event() {
        let state = test_state();
        let mut rx = state.event_tx.subscribe();

        state
            .request_speech(SpeechField::Custom, Some("places please".to_string()))
            .unwrap();

        let mut speak_events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::SpeakRequest(trigger) = event {
                speak_events.push(trigger);
            }
        }
        assert_eq!(speak_events.len(), 1);
        assert_eq!(speak_events[0].field, SpeechField::Custom);
        assert_eq!(
            speak_events[0].custom_text.as_deref(),
            Some("places please")
        );
    }

    #[tokio::test]
    async fn timer_end_trigger_fires_exactly_once() {
        let state = speech_state(SpeechTriggerMode::TimerEnd);
        state.set_timer(1).unwrap();
        state.start().unwrap();
        let mut rx = state.event_tx.subscribe();

        state.tick().unwrap(); // 1 -> 0 crosses the end
        state.tick().unwrap(); // 0 -> -1 stays past it

        let triggers: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, EngineEvent::TriggerSpeech(_)))
            .collect();
        assert_eq!(triggers.len(), 1);
        state.stop().unwrap();
    }

    #[tokio::test]
    async fn warning_trigger_fires_on_threshold_cross() {
        let state = speech_state(SpeechTriggerMode::Warnings);
        state.set_timer(181).unwrap();
        state.start().unwrap();
        let mut rx = state.event_tx.subscribe();

        state.tick().unwrap(); // 181 -> 180 crosses amber
        state.tick().unwrap(); // 180 -> 179 inside the band, no new cross

        let triggers: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, EngineEvent::TriggerSpeech(_)))
            .collect();
        assert_eq!(triggers.len(), 1);
        state.stop().unwrap();
    }

    #[tokio::test]
    async fn shutdown_cancels_tick_driver() {
        let state = test_state();
        state.set_timer(30).unwrap();
        state.start().unwrap();
        assert!(state.has_tick_driver().unwrap());

        state.shutdown();
        assert!(!state.has_tick_driver().unwrap());
    }
}

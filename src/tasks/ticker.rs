//! Once-per-second tick driver task

use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error};

use crate::state::AppState;

/// Drive the countdown while the timer is running.
///
/// Spawned by `AppState::start` and aborted by `pause`/`stop`/`set_timer`/
/// teardown; the engine holds the only handle. Each interval tick is applied
/// through `AppState::tick`, which re-checks the phase under the state lock,
/// so a tick racing a cancellation is discarded rather than applied.
pub async fn ticker_task(state: Arc<AppState>) {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first interval tick completes immediately; consume it so the
    // countdown decrements one full second after start.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match state.tick() {
            Ok(true) => {}
            Ok(false) => {
                debug!("Tick driver exiting: timer no longer running");
                break;
            }
            Err(e) => {
                error!("Tick driver stopping after state error: {}", e);
                break;
            }
        }
    }
}

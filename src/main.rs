//! Countdown Server - a state-managed HTTP server for synchronized countdown
//! timer displays
//!
//! This is the main entry point for the countdown-server application.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use countdown_server::{api::create_router, config::Config, state::AppState, utils::shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "countdown_server={},tower_http=info",
            config.log_level()
        ))
        .init();

    info!("Starting countdown-server v1.2.0");
    info!("Configuration: host={}, port={}", config.host, config.port);

    // Validate the display configuration once, before anything consumes it
    let display_config = config
        .display_config()
        .map_err(anyhow::Error::msg)
        .context("invalid display configuration")?;

    // Create application state; the tick driver is installed on demand when
    // the timer starts
    let state = AppState::new(display_config);

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /set?time=HH:MM:SS      - Set timer duration");
    info!("  POST /control?action=...     - Start, pause, or stop");
    info!("  POST /add?time=HH:MM:SS      - Add time");
    info!("  POST /subtract?time=HH:MM:SS - Subtract time");
    info!("  POST /aux?field=...&text=... - Set aux text");
    info!("  POST /speak?field=...        - Trigger speech");
    info!("  POST /speak/clear            - Clear pending speech request");
    info!("  GET  /state                  - Current timer snapshot");
    info!("  GET  /config                 - Active configuration");
    info!("  GET  /events                 - Push transport (SSE)");
    info!("  GET  /health                 - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Cancel the tick driver before the runtime goes away
    state.shutdown();

    info!("Server shutdown complete");
    Ok(())
}

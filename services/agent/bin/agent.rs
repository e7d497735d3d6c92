//! Main Entrypoint for the Lingobridge Agent
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Starting the bridge (realtime client, microphone track, orchestrator).
//! 4. Handing the platform endpoints to the meeting-SDK adapter.
//! 5. Running until the meeting ends or a shutdown signal arrives.

use anyhow::Context;
use lingobridge_agent::{config::Config, start_agent};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the agent.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(
        meeting_id = %config.meeting_id,
        agent_name = %config.agent_name,
        model = %config.model,
        "Configuration loaded. Starting bridge..."
    );

    // --- 3. Start the Bridge ---
    let (platform, mut orchestrator) = start_agent(&config);

    // --- 4. Attach the Meeting SDK Adapter ---
    // The call-platform client is an external collaborator: it joins the
    // meeting identified by `config.meeting_id`, forwards lifecycle events
    // onto `platform.events`, and plays `platform.microphone` chunks as
    // the agent's outbound audio track.
    info!("Bridge running. Waiting for call platform events...");

    // --- 5. Run Until Shutdown ---
    tokio::select! {
        _ = shutdown_signal() => {
            // Dropping the platform endpoints closes the orchestrator's
            // event sources and lets it wind down.
            drop(platform);
            orchestrator.await.context("Orchestrator task panicked")?;
        }
        result = &mut orchestrator => {
            result.context("Orchestrator task panicked")?;
            info!("Meeting ended.");
        }
    }

    info!("Agent has shut down.");
    Ok(())
}

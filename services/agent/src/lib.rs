//! Lingobridge Agent Library Crate
//!
//! This library contains the meeting-side half of the translation bridge:
//! the audio resampler, per-stream inbound routers, the synthetic
//! microphone track, the session orchestrator, and configuration. The
//! `bin/agent.rs` binary is a thin wrapper around [`start_agent`].

pub mod audio;
pub mod config;
pub mod orchestrator;
pub mod platform;
pub mod router;
pub mod track;

use std::sync::Arc;

use bytes::Bytes;
use lingobridge_realtime::{RealtimeClient, SessionConfig};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{config::Config, orchestrator::Orchestrator, platform::PlatformHandle, track::MicrophoneTrack};

/// Wires the realtime client, microphone track, and orchestrator together.
///
/// Returns the handle the call-platform adapter drives (meeting events in,
/// paced microphone PCM out) and the orchestrator's join handle.
pub fn start_agent(config: &Config) -> (PlatformHandle, JoinHandle<()>) {
    let session = SessionConfig {
        model: config.model.clone(),
        voice: config.voice,
        ..SessionConfig::default()
    };

    let (client, session_rx) = RealtimeClient::new(config.openai_api_key.clone(), session);
    let client = Arc::new(client);

    let (meeting_tx, meeting_rx) = mpsc::channel(64);
    let (mic_tx, mic_rx) = mpsc::channel::<Bytes>(64);
    let track = Arc::new(MicrophoneTrack::spawn(mic_tx));

    let orchestrator = Orchestrator::new(client, track);
    let handle = tokio::spawn(orchestrator.run(meeting_rx, session_rx));

    (
        PlatformHandle {
            events: meeting_tx,
            microphone: mic_rx,
        },
        handle,
    )
}

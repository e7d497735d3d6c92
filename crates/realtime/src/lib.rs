//! Client for the OpenAI Realtime API over WebSocket.
//!
//! The [`RealtimeClient`] owns the connection lifecycle: it opens the
//! transport with bearer-token auth, pushes the full session configuration
//! via `session.update`, streams base64 PCM16 audio with
//! `input_audio_buffer.append`, and runs a receive loop that turns the
//! server's JSON events into typed [`SessionEvent`]s on an mpsc channel.

pub mod client;
pub mod types;

pub use client::{ConnectionState, RealtimeClient, RealtimeError, SessionEvent};
pub use types::{
    AudioFormat, ClientEvent, InputAudioTranscription, ServerEvent, SessionConfig, TurnDetection,
    Voice,
};

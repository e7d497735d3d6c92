//! Typed boundary with the call platform.
//!
//! The meeting SDK itself is an external collaborator; this module only
//! defines the events it emits onto the orchestrator's channel and the raw
//! audio frames its streams produce. The synthetic microphone direction is
//! a plain byte channel carrying paced PCM16 chunks.

use bytes::Bytes;
use tokio::sync::mpsc;

/// One frame of raw call audio. Ephemeral; dropped after one transcode.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Interleaved 16-bit samples.
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
}

/// Lifecycle notifications from the call platform, consumed by the
/// orchestrator in arrival order.
#[derive(Debug)]
pub enum MeetingEvent {
    /// The agent itself finished joining the meeting.
    MeetingJoined,
    MeetingLeft,
    ParticipantJoined {
        id: String,
        display_name: String,
        preferred_language: String,
    },
    ParticipantLeft {
        id: String,
    },
    /// A participant stream became available. For audio streams the
    /// receiver yields that stream's raw frames.
    StreamEnabled {
        stream_id: String,
        kind: StreamKind,
        frames: mpsc::Receiver<AudioFrame>,
    },
    StreamDisabled {
        stream_id: String,
        kind: StreamKind,
    },
}

/// Endpoints handed to the call-platform adapter: it pushes meeting events
/// in and plays the paced microphone chunks out as the agent's voice.
pub struct PlatformHandle {
    pub events: mpsc::Sender<MeetingEvent>,
    pub microphone: mpsc::Receiver<Bytes>,
}

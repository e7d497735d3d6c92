//! Reacts to call-platform lifecycle events and supervises the session.
//!
//! The orchestrator consumes typed [`MeetingEvent`]s from the platform
//! adapter and [`SessionEvent`]s from the realtime client. It never touches
//! audio bytes on the inbound path; it only starts and stops the per-stream
//! routers, keeps the participant roster, and pushes translation directives
//! into the session configuration.

use std::{sync::Arc, time::Duration};

use lingobridge_realtime::{RealtimeClient, SessionEvent};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    platform::{MeetingEvent, StreamKind},
    router::{ListenerSet, spawn_stream_listener},
    track::MicrophoneTrack,
};

/// Wait before the single reconnect attempt after a failed connect.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// One participant, kept for the session lifetime.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub preferred_language: String,
}

/// Participants in join order.
#[derive(Default)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a join. Returns the translator directive exactly when this
    /// join brings the roster to two participants.
    pub fn join(&mut self, participant: Participant) -> Option<String> {
        if self.participants.iter().any(|p| p.id == participant.id) {
            return None;
        }
        self.participants.push(participant);
        match self.participants.as_slice() {
            [first, second] => Some(translator_directive(first, second)),
            _ => None,
        }
    }

    pub fn leave(&mut self, id: &str) {
        self.participants.retain(|p| p.id != id);
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// Builds the instructions for a two-party session. The text fully
/// replaces the default instructions: the model acts purely as an
/// interpreter between the pair, in join order.
pub fn translator_directive(first: &Participant, second: &Participant) -> String {
    format!(
        "You are a real-time interpreter bridging a conversation between:\n\
         - {} (speaks {})\n\
         - {} (speaks {})\n\n\
         When {} is spoken, repeat exactly what was said in {}. When {} is \
         spoken, repeat exactly what was said in {}. Keep track of who \
         speaks which language. Your only job is to translate between the \
         two languages; do not engage in the conversation and do not add \
         commentary.",
        first.display_name,
        first.preferred_language,
        second.display_name,
        second.preferred_language,
        first.preferred_language,
        second.preferred_language,
        second.preferred_language,
        first.preferred_language,
    )
}

/// Supervises session lifecycle and per-stream routers.
pub struct Orchestrator {
    client: Arc<RealtimeClient>,
    track: Arc<MicrophoneTrack>,
    roster: Roster,
    listeners: ListenerSet,
}

impl Orchestrator {
    pub fn new(client: Arc<RealtimeClient>, track: Arc<MicrophoneTrack>) -> Self {
        Self {
            client,
            track,
            roster: Roster::new(),
            listeners: ListenerSet::new(),
        }
    }

    /// Runs until the meeting ends or both event sources close.
    pub async fn run(
        mut self,
        mut meeting_rx: mpsc::Receiver<MeetingEvent>,
        mut session_rx: mpsc::Receiver<SessionEvent>,
    ) {
        loop {
            tokio::select! {
                event = meeting_rx.recv() => match event {
                    Some(event) => {
                        if !self.handle_meeting_event(event).await {
                            break;
                        }
                    }
                    // The platform adapter went away; the meeting is over.
                    None => break,
                },
                Some(event) = session_rx.recv() => {
                    self.handle_session_event(event).await;
                }
                else => break,
            }
        }

        self.listeners.abort_all();
        self.client.close().await;
        info!("orchestrator stopped");
    }

    /// Returns false when the meeting is over.
    async fn handle_meeting_event(&mut self, event: MeetingEvent) -> bool {
        match event {
            MeetingEvent::MeetingJoined => {
                info!("meeting joined, opening realtime session");
                self.connect_with_retry().await;
            }
            MeetingEvent::MeetingLeft => {
                info!("meeting left");
                return false;
            }
            MeetingEvent::ParticipantJoined {
                id,
                display_name,
                preferred_language,
            } => {
                info!(%id, %display_name, %preferred_language, "participant joined");
                let directive = self.roster.join(Participant {
                    id,
                    display_name,
                    preferred_language,
                });
                if let Some(directive) = directive {
                    info!("two participants present, pushing translation directive");
                    if let Err(e) = self.client.update_instructions(directive).await {
                        // The directive is retained in the session record
                        // and goes out with the next connect.
                        warn!(error = %e, "could not push translation directive");
                    }
                }
            }
            MeetingEvent::ParticipantLeft { id } => {
                info!(%id, "participant left");
                self.roster.leave(&id);
            }
            MeetingEvent::StreamEnabled {
                stream_id,
                kind,
                frames,
            } => {
                if kind != StreamKind::Audio {
                    debug!(%stream_id, ?kind, "ignoring non-audio stream");
                    return true;
                }
                info!(%stream_id, "audio stream enabled");
                let handle =
                    spawn_stream_listener(stream_id.clone(), frames, Arc::clone(&self.client));
                self.listeners.insert(stream_id, handle);
            }
            MeetingEvent::StreamDisabled { stream_id, kind } => {
                if kind != StreamKind::Audio {
                    return true;
                }
                info!(%stream_id, "audio stream disabled");
                self.listeners.remove(&stream_id);
            }
        }
        true
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Ready => info!("realtime session ready"),
            SessionEvent::Audio(pcm) => self.track.push(&pcm).await,
            SessionEvent::SpeechStarted => {
                info!("participant speech started, flushing playback queue");
                self.track.flush().await;
            }
            SessionEvent::OutputTranscript(text) => {
                info!(transcript = %text, "translation spoken");
            }
            SessionEvent::InputTranscript(text) => {
                info!(transcript = %text, "participant speech transcribed");
            }
            SessionEvent::Error(message) => {
                error!(%message, "realtime service reported an error");
            }
            SessionEvent::Closed => {
                warn!("realtime transport closed; translated audio stops until rejoin");
            }
        }
    }

    /// One connect attempt plus a single backed-off retry. Further retries
    /// would only hammer a failing endpoint; the degraded mode is silence.
    async fn connect_with_retry(&self) {
        match self.client.connect().await {
            Ok(()) => return,
            Err(e) => warn!(error = %e, "realtime connect failed, retrying once"),
        }
        tokio::time::sleep(RECONNECT_BACKOFF).await;
        if let Err(e) = self.client.connect().await {
            error!(error = %e, "realtime connect failed permanently for this session");
        }
    }
}

//! Owns the WebSocket session with the realtime service.
//!
//! One client maps to one session. Outbound sends from any number of tasks
//! serialize on the writer lock, so each send is a single atomic framed
//! write. The receive loop runs until the transport closes and forwards
//! typed [`SessionEvent`]s to whoever holds the receiver.

use std::sync::{
    Arc, Mutex as StdMutex,
    atomic::{AtomicU64, Ordering},
};

use base64::Engine;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use secrecy::{ExposeSecret, SecretString};
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::types::{ClientEvent, ServerEvent, SessionConfig, generate_event_id};

/// Realtime WebSocket endpoint.
pub const REALTIME_WS_URL: &str = "wss://api.openai.com/v1/realtime";

/// Protocol-revision header sent on connect.
const REALTIME_PROTOCOL_HEADER: (&str, &str) = ("OpenAI-Beta", "realtime=v1");

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("not connected to the realtime service")]
    NotConnected,
    #[error("websocket transport error: {0}")]
    Transport(#[from] WsError),
    #[error("failed to build connection request: {0}")]
    Handshake(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connection lifecycle of a [`RealtimeClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Streaming,
    Closed,
    Failed,
}

/// Typed events dispatched by the receive loop.
#[derive(Debug)]
pub enum SessionEvent {
    /// The service acknowledged the session (`session.created`).
    Ready,
    /// A chunk of AI-generated PCM16 audio, already base64-decoded.
    Audio(Bytes),
    /// Completed transcript of the AI's spoken output.
    OutputTranscript(String),
    /// Completed transcript of a participant's speech.
    InputTranscript(String),
    /// The human started speaking; queued playback should be cut off.
    SpeechStarted,
    /// A server-reported error.
    Error(String),
    /// The transport closed; no further events will arrive.
    Closed,
}

/// Client for one realtime session.
pub struct RealtimeClient {
    api_key: SecretString,
    url: String,
    session: Mutex<SessionConfig>,
    writer: Mutex<Option<WsSink>>,
    reader: StdMutex<Option<JoinHandle<()>>>,
    state: Arc<StdMutex<ConnectionState>>,
    // Bumped on every connect; a receive loop carries the value it was
    // spawned with and may only touch shared state while they match.
    generation: Arc<AtomicU64>,
    event_tx: mpsc::Sender<SessionEvent>,
}

impl RealtimeClient {
    /// Creates a disconnected client and the receiver for its session events.
    pub fn new(api_key: SecretString, config: SessionConfig) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let client = Self {
            api_key,
            url: REALTIME_WS_URL.to_string(),
            session: Mutex::new(config),
            writer: Mutex::new(None),
            reader: StdMutex::new(None),
            state: Arc::new(StdMutex::new(ConnectionState::Disconnected)),
            generation: Arc::new(AtomicU64::new(0)),
            event_tx,
        };
        (client, event_rx)
    }

    /// Overrides the service endpoint, e.g. for a regional deployment.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True once the transport is open and sends can succeed.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Streaming
        )
    }

    /// Opens the transport, spawns the receive loop, and pushes the initial
    /// session configuration. Transport failures surface to the caller;
    /// retry policy belongs to the orchestrator.
    pub async fn connect(&self) -> Result<(), RealtimeError> {
        // A reconnect supersedes any previous transport: stop its receive
        // loop and writer half first, and bump the generation so a
        // straggling loop cannot mark the new connection closed.
        if let Some(old) = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            old.abort();
        }
        if let Some(mut stale) = self.writer.lock().await.take() {
            let _ = stale.send(WsMessage::Close(None)).await;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Connecting);

        let model = self.session.lock().await.model.clone();
        let url = format!("{}?model={}", self.url, model);
        let mut request = url.into_client_request()?;
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret())
                .parse()
                .map_err(|_| RealtimeError::Handshake("invalid authorization header".into()))?,
        );
        request.headers_mut().insert(
            REALTIME_PROTOCOL_HEADER.0,
            REALTIME_PROTOCOL_HEADER
                .1
                .parse()
                .map_err(|_| RealtimeError::Handshake("invalid protocol header".into()))?,
        );

        let (ws_stream, _) = match connect_async(request).await {
            Ok(conn) => conn,
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                return Err(e.into());
            }
        };
        info!(model = %model, "connected to realtime service");

        let (ws_tx, ws_rx) = ws_stream.split();
        *self.writer.lock().await = Some(ws_tx);
        self.set_state(ConnectionState::Connected);

        let event_tx = self.event_tx.clone();
        let state = Arc::clone(&self.state);
        let generations = Arc::clone(&self.generation);
        let handle = tokio::spawn(async move {
            receive_loop(ws_rx, event_tx, state, generations, generation).await;
        });
        *self.reader.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        // The service replaces its session config with the latest full
        // record it receives, so the initial push must be complete.
        let config = self.session.lock().await.clone();
        self.send(&ClientEvent::SessionUpdate {
            event_id: generate_event_id(),
            session: config,
        })
        .await?;
        self.set_state(ConnectionState::Streaming);
        Ok(())
    }

    /// Replaces the whole session configuration and re-sends it.
    pub async fn update_session(&self, config: SessionConfig) -> Result<(), RealtimeError> {
        *self.session.lock().await = config.clone();
        self.send(&ClientEvent::SessionUpdate {
            event_id: generate_event_id(),
            session: config,
        })
        .await
    }

    /// Swaps the session instructions, keeping the rest of the record, and
    /// re-sends the full record. The new text is retained even if the send
    /// fails, so a later connect picks it up.
    pub async fn update_instructions(&self, instructions: String) -> Result<(), RealtimeError> {
        let config = {
            let mut session = self.session.lock().await;
            session.instructions = instructions;
            session.clone()
        };
        self.send(&ClientEvent::SessionUpdate {
            event_id: generate_event_id(),
            session: config,
        })
        .await
    }

    /// Fire-and-forget append of already-resampled PCM16 audio.
    pub async fn send_audio(&self, pcm: &[u8]) -> Result<(), RealtimeError> {
        if pcm.is_empty() {
            return Ok(());
        }
        let audio = base64::engine::general_purpose::STANDARD.encode(pcm);
        self.send(&ClientEvent::InputAudioBufferAppend {
            event_id: generate_event_id(),
            audio,
        })
        .await
    }

    /// Returns a copy of the current session configuration record.
    pub async fn session(&self) -> SessionConfig {
        self.session.lock().await.clone()
    }

    /// Closes the transport. Idempotent; sends after this fail with
    /// [`RealtimeError::NotConnected`].
    pub async fn close(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.send(WsMessage::Close(None)).await;
        }
        self.set_state(ConnectionState::Closed);
    }

    async fn send(&self, event: &ClientEvent) -> Result<(), RealtimeError> {
        // A closed transport may still hold a writer half; the state is
        // authoritative.
        if matches!(
            self.state(),
            ConnectionState::Closed | ConnectionState::Failed
        ) {
            return Err(RealtimeError::NotConnected);
        }
        let json = serde_json::to_string(event)?;
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(RealtimeError::NotConnected)?;
        sink.send(WsMessage::Text(json.into())).await?;
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }
}

/// Reads frames until the transport closes, dispatching typed events.
/// A malformed frame or a server error event is logged and skipped; only
/// transport closure ends the loop.
async fn receive_loop(
    mut ws_rx: WsSource,
    event_tx: mpsc::Sender<SessionEvent>,
    state: Arc<StdMutex<ConnectionState>>,
    generations: Arc<AtomicU64>,
    generation: u64,
) {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                if dispatch(&text, &event_tx).await.is_err() {
                    debug!("session event receiver dropped, stopping receive loop");
                    break;
                }
            }
            Ok(WsMessage::Close(frame)) => {
                info!(?frame, "realtime service closed the connection");
                break;
            }
            // Ping/pong are answered by tungstenite; binary is not part of
            // this protocol.
            Ok(_) => {}
            Err(e) => match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Io(_) => {
                    warn!(error = %e, "realtime transport failed");
                    break;
                }
                other => {
                    warn!(error = %other, "ignoring malformed frame from realtime service");
                }
            },
        }
    }

    // Only the loop serving the live connection may mark the client
    // closed; a loop superseded by a reconnect exits without touching
    // shared state.
    if generations.load(Ordering::SeqCst) == generation {
        *state.lock().unwrap_or_else(|e| e.into_inner()) = ConnectionState::Closed;
        let _ = event_tx.send(SessionEvent::Closed).await;
    }
}

/// Parses one text frame and forwards the matching [`SessionEvent`], if any.
/// Returns `Err` only when the event receiver is gone.
async fn dispatch(text: &str, event_tx: &mpsc::Sender<SessionEvent>) -> Result<(), ()> {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "unparseable frame from realtime service");
            return Ok(());
        }
    };

    let session_event = match event {
        ServerEvent::SessionCreated => {
            info!("realtime session created");
            Some(SessionEvent::Ready)
        }
        ServerEvent::SessionUpdated => {
            info!("realtime session configuration applied");
            None
        }
        ServerEvent::ResponseAudioDelta { delta } => {
            match base64::engine::general_purpose::STANDARD.decode(&delta) {
                Ok(pcm) => Some(SessionEvent::Audio(Bytes::from(pcm))),
                Err(e) => {
                    warn!(error = %e, "dropping audio delta with invalid base64");
                    None
                }
            }
        }
        ServerEvent::ResponseAudioTranscriptDone { transcript } => {
            Some(SessionEvent::OutputTranscript(transcript))
        }
        ServerEvent::InputAudioTranscriptionCompleted { transcript } => {
            Some(SessionEvent::InputTranscript(transcript))
        }
        ServerEvent::SpeechStarted => {
            debug!("speech started upstream");
            Some(SessionEvent::SpeechStarted)
        }
        ServerEvent::Error { error } => {
            error!(message = %error.message, code = ?error.code, "realtime service error");
            Some(SessionEvent::Error(error.message))
        }
        ServerEvent::Unknown => None,
    };

    if let Some(event) = session_event {
        event_tx.send(event).await.map_err(|_| ())?;
    }
    Ok(())
}

//! Wire types for the OpenAI Realtime API protocol.
//!
//! Client and server envelopes are tagged enums discriminated by the JSON
//! `type` field, so dispatch is checked for exhaustiveness at compile time.
//! Server event types this bridge does not care about fall into
//! [`ServerEvent::Unknown`] and are ignored rather than treated as fatal.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default realtime model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Default session instructions, replaced wholesale once a translation
/// directive is available.
pub const DEFAULT_INSTRUCTIONS: &str = "Actively listen to the user's questions and provide \
     concise, relevant responses. Acknowledge the user's intent before answering. Keep \
     responses under 2 sentences.";

/// Generates a fresh client event id. Ids are never reused within a session.
pub fn generate_event_id() -> String {
    format!("evt_{}", Uuid::new_v4().simple())
}

/// Audio formats accepted by the realtime service.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Pcm16,
    G711Ulaw,
    G711Alaw,
}

/// Voices available for audio output.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Alloy,
    Echo,
    Shimmer,
}

impl Voice {
    /// Parses a voice name as it appears in configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "alloy" => Some(Self::Alloy),
            "echo" => Some(Self::Echo),
            "shimmer" => Some(Self::Shimmer),
            _ => None,
        }
    }
}

/// Server-side voice-activity segmentation policy, forwarded verbatim.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
    },
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self::ServerVad {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 200,
        }
    }
}

/// Input transcription policy (which model transcribes inbound speech).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InputAudioTranscription {
    pub model: String,
}

impl Default for InputAudioTranscription {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
        }
    }
}

/// The full session configuration record. Mutations re-serialize and re-send
/// the whole record inside a `session.update` envelope; the service applies
/// the latest configuration it receives.
#[derive(Serialize, Clone, Debug)]
pub struct SessionConfig {
    pub model: String,
    pub instructions: String,
    pub voice: Voice,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    pub temperature: f32,
    pub tool_choice: String,
    pub tools: Vec<serde_json::Value>,
    pub turn_detection: TurnDetection,
    pub modalities: Vec<String>,
    pub max_response_output_tokens: u32,
    pub input_audio_transcription: InputAudioTranscription,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            voice: Voice::Alloy,
            input_audio_format: AudioFormat::Pcm16,
            output_audio_format: AudioFormat::Pcm16,
            temperature: 0.8,
            tool_choice: "auto".to_string(),
            tools: Vec::new(),
            turn_detection: TurnDetection::default(),
            modalities: vec!["text".to_string(), "audio".to_string()],
            max_response_output_tokens: 512,
            input_audio_transcription: InputAudioTranscription::default(),
        }
    }
}

/// Client-to-server envelopes. Every variant carries a freshly generated
/// event id.
#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate {
        event_id: String,
        session: SessionConfig,
    },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { event_id: String, audio: String },
}

/// Detail payload of a server `error` event.
#[derive(Deserialize, Debug, Clone)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Server-to-client envelopes, discriminated by the `type` field.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta { delta: String },
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone { transcript: String },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted { transcript: String },
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "error")]
    Error { error: ErrorDetail },
    /// Any event type this bridge does not handle.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_event_id()));
        }
    }

    #[test]
    fn event_ids_carry_prefix() {
        assert!(generate_event_id().starts_with("evt_"));
    }

    #[test]
    fn session_update_serializes_full_record() {
        let event = ClientEvent::SessionUpdate {
            event_id: generate_event_id(),
            session: SessionConfig::default(),
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["model"], DEFAULT_MODEL);
        assert_eq!(value["session"]["voice"], "alloy");
        assert_eq!(value["session"]["input_audio_format"], "pcm16");
        assert_eq!(value["session"]["output_audio_format"], "pcm16");
        assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(value["session"]["turn_detection"]["prefix_padding_ms"], 300);
        assert_eq!(value["session"]["max_response_output_tokens"], 512);
        assert_eq!(
            value["session"]["input_audio_transcription"]["model"],
            "whisper-1"
        );
    }

    #[test]
    fn audio_append_serializes_tag_and_payload() {
        let event = ClientEvent::InputAudioBufferAppend {
            event_id: "evt_1".to_string(),
            audio: "AAAA".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "input_audio_buffer.append");
        assert_eq!(value["audio"], "AAAA");
        assert_eq!(value["event_id"], "evt_1");
    }

    #[test]
    fn parse_session_created_ignores_payload() {
        let json = r#"{"type": "session.created", "session": {"id": "sess_1"}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::SessionCreated));
    }

    #[test]
    fn parse_audio_delta() {
        let json = r#"{"type": "response.audio.delta", "delta": "UENNMTY="}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::ResponseAudioDelta { delta } => assert_eq!(delta, "UENNMTY="),
            other => panic!("expected audio delta, got {other:?}"),
        }
    }

    #[test]
    fn parse_input_transcription_completed() {
        let json = r#"{"type": "conversation.item.input_audio_transcription.completed", "transcript": "hola"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            ServerEvent::InputAudioTranscriptionCompleted { transcript } if transcript == "hola"
        ));
    }

    #[test]
    fn parse_speech_started() {
        let json = r#"{"type": "input_audio_buffer.speech_started", "audio_start_ms": 120}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::SpeechStarted));
    }

    #[test]
    fn parse_error_event() {
        let json =
            r#"{"type": "error", "error": {"type": "invalid_request_error", "message": "bad"}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.message, "bad");
                assert_eq!(error.kind.as_deref(), Some("invalid_request_error"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_are_tolerated() {
        let json = r#"{"type": "response.created", "response": {}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn voice_names_round_trip() {
        assert_eq!(Voice::from_name("Alloy"), Some(Voice::Alloy));
        assert_eq!(Voice::from_name("shimmer"), Some(Voice::Shimmer));
        assert_eq!(Voice::from_name("nonsense"), None);
    }
}

use serde::{Deserialize, Serialize};

/// Text frame a client sends to end the audio stream
pub const STOP_COMMAND: &str = "stop";

/// Final text frame sent after every queued event has been delivered
pub const STOP_ACK: &str = "asr stopped";

/// One recognized sentence segment, partial or final.
///
/// Produced by the engine callback, queued, and delivered to the client in
/// strictly increasing `sequence` order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionEvent {
    /// Recognized text for the current sentence
    pub text: String,

    /// True on a sentence boundary
    pub is_final: bool,

    /// Position in callback-invocation order, starting at 1
    pub sequence: u64,
}

/// Wire form of a transcription event
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptFrame {
    pub text: String,
    pub is_end: bool,
}

impl From<&TranscriptionEvent> for TranscriptFrame {
    fn from(event: &TranscriptionEvent) -> Self {
        Self {
            text: event.text.clone(),
            is_end: event.is_final,
        }
    }
}

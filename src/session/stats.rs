use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a relay session, logged when the session closes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// When the client connected
    pub started_at: DateTime<Utc>,

    /// Total session duration in seconds
    pub duration_secs: f64,

    /// Audio bytes received from the client
    pub audio_bytes: u64,

    /// Transcription events delivered to the client
    pub events_delivered: u64,

    /// Whether the session ended with a clean `stop` and acknowledgment
    pub clean_stop: bool,
}

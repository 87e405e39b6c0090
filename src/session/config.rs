use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one relay session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session tag used in logs and capture filenames
    pub tag: String,

    /// PCM sample rate the client agreed to at session start
    pub sample_rate: u32,

    /// How long to wait for the engine to flush buffered results after stop
    pub engine_flush_timeout: Duration,

    /// How long to wait for queued events to reach the client at shutdown
    pub drain_timeout: Duration,

    /// Backlog limit; crossing it tears the session down
    pub max_pending_events: usize,

    /// Directory for the session's WAV capture, if capture is enabled
    pub capture_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tag: format!("session-{}", uuid::Uuid::new_v4()),
            sample_rate: 16000,
            engine_flush_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(10),
            max_pending_events: 4096,
            capture_dir: None,
        }
    }
}

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub engine: EngineSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub ws: WsConfig,
}

#[derive(Debug, Deserialize)]
pub struct WsConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct EngineSettings {
    /// Recognition model name (e.g. "paraformer-realtime-v2")
    pub model: String,

    /// Engine duplex WebSocket endpoint
    pub endpoint: String,

    /// Vocabulary REST endpoint (queried once at startup)
    pub vocabulary_endpoint: String,

    /// API key; falls back to the DASHSCOPE_API_KEY env var when absent
    pub api_key: Option<String>,

    /// PCM sample rate expected from clients (8000 or 16000)
    pub sample_rate: u32,

    /// Language hints passed to the engine
    pub language_hints: Vec<String>,

    /// Whether the engine should insert punctuation on semantic boundaries
    #[serde(default)]
    pub semantic_punctuation: bool,
}

#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    /// Maximum events allowed to back up before the session is torn down
    pub max_pending_events: usize,

    /// Seconds to wait for the engine to flush results after stop
    pub engine_flush_timeout_secs: u64,

    /// Seconds to wait for queued events to reach the client at shutdown
    pub drain_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_pending_events: 4096,
            engine_flush_timeout_secs: 5,
            drain_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AudioConfig {
    /// Directory for per-session WAV captures; disabled when unset
    pub capture_dir: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

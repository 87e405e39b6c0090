pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod server;
pub mod session;

pub use audio::CaptureWriter;
pub use config::Config;
pub use engine::{
    DashScopeEngine, EngineConfig, EngineSignal, EngineStream, RecognitionBridge,
    RecognitionEngine, RecognitionObserver, RecognitionResult, VocabularyClient,
};
pub use error::{EngineDiagnostic, RelayError};
pub use server::{create_router, AppState};
pub use session::{
    RelaySession, SessionConfig, SessionHandle, SessionState, SessionStats, TranscriptFrame,
    TranscriptQueue, TranscriptionEvent, STOP_ACK, STOP_COMMAND,
};

//! Recognition engine integration
//!
//! The engine is an external streaming speech-to-text service. This module
//! defines the seam it is consumed through (`RecognitionEngine` /
//! `EngineStream` plus the observer callback contract), the bridge that turns
//! engine callbacks into ordered queue events, and the concrete DashScope
//! implementation.

mod bridge;
mod dashscope;
mod vocabulary;

pub use bridge::{EngineSignal, RecognitionBridge};
pub use dashscope::DashScopeEngine;
pub use vocabulary::VocabularyClient;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineDiagnostic, RelayError};

/// Engine session parameters, fixed when the stream is opened
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Recognition model name
    pub model: String,

    /// Custom vocabulary to bias recognition with, if one was resolved
    pub vocabulary_id: Option<String>,

    /// Audio container format ("pcm")
    pub format: String,

    /// Sample rate of the inbound audio
    pub sample_rate: u32,

    /// Language hints (e.g. ["zh", "en"])
    pub language_hints: Vec<String>,

    /// Whether the engine should punctuate on semantic boundaries
    pub semantic_punctuation: bool,
}

/// One recognition result as the engine reports it, before the bridge
/// assigns a sequence number
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    /// Recognized text for the current sentence
    pub text: String,

    /// True when the engine marks a sentence boundary
    pub sentence_end: bool,
}

/// Callback contract for engine-produced events.
///
/// Every method is invoked from an engine-owned task that runs independently
/// of the session's receive/send loops. Implementations must not block:
/// queue pushes and channel sends only.
pub trait RecognitionObserver: Send + Sync {
    /// The engine accepted the session and is ready for audio
    fn on_open(&self) {}

    /// A partial or final recognition result
    fn on_event(&self, result: RecognitionResult);

    /// The engine flushed its last result after end-of-audio
    fn on_complete(&self);

    /// The engine reported a runtime error; fatal for this session only
    fn on_error(&self, error: EngineDiagnostic);

    /// The engine-side stream closed
    fn on_close(&self) {}
}

/// Factory seam for the external recognition service
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Open one streaming recognition session.
    ///
    /// Fails with `RelayError::EngineStart` when the engine cannot be
    /// initialized (bad vocabulary id, unreachable service).
    async fn open(
        &self,
        config: &EngineConfig,
        observer: Arc<dyn RecognitionObserver>,
    ) -> Result<Box<dyn EngineStream>, RelayError>;
}

/// Input half of one open engine session
#[async_trait]
pub trait EngineStream: Send + Sync {
    /// Forward an audio chunk. Fails with `RelayError::EngineFeed` once the
    /// engine session is no longer accepting input.
    async fn feed(&mut self, chunk: &[u8]) -> Result<(), RelayError>;

    /// Signal end-of-audio; the engine flushes buffered recognition and then
    /// reports completion through the observer. Idempotent.
    async fn stop(&mut self) -> Result<(), RelayError>;
}

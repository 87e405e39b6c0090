use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{EngineDiagnostic, RelayError};
use crate::session::{TranscriptQueue, TranscriptionEvent};

use super::{EngineConfig, EngineStream, RecognitionEngine, RecognitionObserver, RecognitionResult};

/// Out-of-band engine condition delivered to the session's control loop
#[derive(Debug)]
pub enum EngineSignal {
    /// The engine flushed its last result after end-of-audio
    Completed,

    /// The engine reported a runtime error
    Failed(EngineDiagnostic),

    /// Queued events crossed the session's backlog limit
    Backlogged { pending: usize },
}

/// Adapts the engine's push-based callbacks into the queue's pull model and
/// forwards audio into the engine.
///
/// The bridge assigns sequence numbers strictly in callback-invocation order
/// and owns the engine stream; `stop` is idempotent.
pub struct RecognitionBridge {
    tag: String,
    engine: Arc<dyn RecognitionEngine>,
    config: EngineConfig,
    queue: Arc<TranscriptQueue>,
    max_pending: usize,
    stream: Option<Box<dyn EngineStream>>,
    stopped: bool,
}

impl RecognitionBridge {
    pub fn new(
        tag: String,
        engine: Arc<dyn RecognitionEngine>,
        config: EngineConfig,
        queue: Arc<TranscriptQueue>,
        max_pending: usize,
    ) -> Self {
        Self {
            tag,
            engine,
            config,
            queue,
            max_pending,
            stream: None,
            stopped: false,
        }
    }

    /// Open the engine session. Returns the signal channel the session's
    /// control loop selects on.
    pub async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<EngineSignal>, RelayError> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let observer = Arc::new(QueueObserver {
            tag: self.tag.clone(),
            queue: Arc::clone(&self.queue),
            sequence: AtomicU64::new(0),
            signals: signal_tx,
            max_pending: self.max_pending,
        });

        let stream = self.engine.open(&self.config, observer).await?;
        self.stream = Some(stream);

        Ok(signal_rx)
    }

    /// Forward an audio chunk to the engine
    pub async fn feed(&mut self, chunk: &[u8]) -> Result<(), RelayError> {
        if self.stopped {
            return Err(RelayError::EngineFeed(
                "engine session already stopped".to_string(),
            ));
        }
        match self.stream.as_mut() {
            Some(stream) => stream.feed(chunk).await,
            None => Err(RelayError::EngineFeed(
                "engine session not started".to_string(),
            )),
        }
    }

    /// Signal end-of-audio. Calling stop twice has no additional effect.
    pub async fn stop(&mut self) -> Result<(), RelayError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        match self.stream.as_mut() {
            Some(stream) => stream.stop().await,
            None => Ok(()),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Observer installed into the engine: sequences results onto the queue and
/// relays completion/error conditions over the signal channel.
struct QueueObserver {
    tag: String,
    queue: Arc<TranscriptQueue>,
    sequence: AtomicU64,
    signals: mpsc::UnboundedSender<EngineSignal>,
    max_pending: usize,
}

impl RecognitionObserver for QueueObserver {
    fn on_open(&self) {
        info!("[{}] Recognition started", self.tag);
    }

    fn on_event(&self, result: RecognitionResult) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = TranscriptionEvent {
            text: result.text,
            is_final: result.sentence_end,
            sequence,
        };

        if self.queue.push(event).is_err() {
            // Client already gone; the engine must not be disrupted
            debug!(
                "[{}] Event {} arrived after queue close, discarded",
                self.tag, sequence
            );
            return;
        }

        let pending = self.queue.len();
        if pending > self.max_pending {
            warn!(
                "[{}] Event backlog at {} (limit {})",
                self.tag, pending, self.max_pending
            );
            let _ = self.signals.send(EngineSignal::Backlogged { pending });
        }
    }

    fn on_complete(&self) {
        info!("[{}] Recognition completed", self.tag);
        let _ = self.signals.send(EngineSignal::Completed);
    }

    fn on_error(&self, error: EngineDiagnostic) {
        let _ = self.signals.send(EngineSignal::Failed(error));
    }

    fn on_close(&self) {
        debug!("[{}] Engine stream closed", self.tag);
    }
}

// Shared test support: a scripted in-process recognition engine.
//
// The engine runs on a spawned OS thread so observer callbacks genuinely
// arrive from a foreign context, out of sync with the session's own loops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use async_trait::async_trait;
use asr_relay::{
    EngineConfig, EngineDiagnostic, EngineStream, RecognitionEngine, RecognitionObserver,
    RecognitionResult, RelayError,
};

/// What the mock engine does over the lifetime of one session
#[derive(Clone, Default)]
pub struct MockScript {
    /// One result emitted per fed chunk, in order; extra chunks emit nothing
    pub per_chunk: Vec<(String, bool)>,

    /// Results flushed after stop, before the completion callback
    pub on_stop: Vec<(String, bool)>,

    /// Delay on the engine thread before each emission
    pub delay: Duration,

    /// Refuse to open the engine session
    pub fail_start: bool,

    /// Report a runtime error instead of the (n+1)th event
    pub fail_after_events: Option<usize>,

    /// Reject feeds after this many chunks
    pub fail_feed_after: Option<usize>,
}

pub struct MockEngine {
    script: MockScript,
    /// Total chunks fed across all sessions
    pub feeds: Arc<AtomicUsize>,
    /// Completion callbacks emitted across all sessions
    pub completes: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new(script: MockScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            feeds: Arc::new(AtomicUsize::new(0)),
            completes: Arc::new(AtomicUsize::new(0)),
        })
    }
}

enum Command {
    Feed,
    Stop,
}

#[async_trait]
impl RecognitionEngine for MockEngine {
    async fn open(
        &self,
        _config: &EngineConfig,
        observer: Arc<dyn RecognitionObserver>,
    ) -> Result<Box<dyn EngineStream>, RelayError> {
        if self.script.fail_start {
            return Err(RelayError::EngineStart("scripted start failure".to_string()));
        }

        observer.on_open();

        let (tx, rx) = mpsc::channel::<Command>();
        let script = self.script.clone();
        let completes = Arc::clone(&self.completes);
        std::thread::spawn(move || engine_thread(script, rx, observer, completes));

        Ok(Box::new(MockStream {
            tx,
            feeds: Arc::clone(&self.feeds),
            fail_feed_after: self.script.fail_feed_after,
            fed: 0,
            stopped: false,
        }))
    }
}

fn engine_thread(
    script: MockScript,
    rx: mpsc::Receiver<Command>,
    observer: Arc<dyn RecognitionObserver>,
    completes: Arc<AtomicUsize>,
) {
    let MockScript {
        per_chunk,
        on_stop,
        delay,
        fail_after_events,
        ..
    } = script;

    let mut pending = per_chunk.into_iter();
    let mut emitted = 0usize;
    let mut failed = false;

    let mut emit = |text: &str, is_final: bool, emitted: &mut usize, failed: &mut bool| {
        if fail_after_events.map_or(false, |n| *emitted >= n) {
            observer.on_error(EngineDiagnostic::message("scripted engine failure"));
            *failed = true;
            return;
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        observer.on_event(RecognitionResult {
            text: text.to_string(),
            sentence_end: is_final,
        });
        *emitted += 1;
    };

    while let Ok(command) = rx.recv() {
        match command {
            Command::Feed => {
                if failed {
                    continue;
                }
                if let Some((text, is_final)) = pending.next() {
                    emit(&text, is_final, &mut emitted, &mut failed);
                }
            }
            Command::Stop => {
                if !failed {
                    for (text, is_final) in on_stop.iter() {
                        if failed {
                            break;
                        }
                        emit(text, *is_final, &mut emitted, &mut failed);
                    }
                    observer.on_complete();
                    completes.fetch_add(1, Ordering::SeqCst);
                }
                break;
            }
        }
    }

    observer.on_close();
}

struct MockStream {
    tx: mpsc::Sender<Command>,
    feeds: Arc<AtomicUsize>,
    fail_feed_after: Option<usize>,
    fed: usize,
    stopped: bool,
}

#[async_trait]
impl EngineStream for MockStream {
    async fn feed(&mut self, _chunk: &[u8]) -> Result<(), RelayError> {
        if self.stopped {
            return Err(RelayError::EngineFeed("stream stopped".to_string()));
        }
        self.fed += 1;
        if self.fail_feed_after.map_or(false, |n| self.fed > n) {
            return Err(RelayError::EngineFeed("scripted feed failure".to_string()));
        }
        self.feeds.fetch_add(1, Ordering::SeqCst);
        self.tx
            .send(Command::Feed)
            .map_err(|_| RelayError::EngineFeed("engine thread gone".to_string()))
    }

    async fn stop(&mut self) -> Result<(), RelayError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        let _ = self.tx.send(Command::Stop);
        Ok(())
    }
}

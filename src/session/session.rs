use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::audio::CaptureWriter;
use crate::engine::{EngineConfig, EngineSignal, RecognitionBridge, RecognitionEngine};
use crate::error::{EngineDiagnostic, RelayError};

use super::config::SessionConfig;
use super::events::{TranscriptFrame, STOP_ACK, STOP_COMMAND};
use super::queue::TranscriptQueue;
use super::stats::SessionStats;

type ClientSink = SplitSink<WebSocket, Message>;

/// Lifecycle of one relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Engine session being opened
    Starting,
    /// Audio flowing in, events flowing out
    Streaming,
    /// End-of-audio signalled; no further audio accepted
    Stopping,
    /// Waiting for queued events to reach the client
    Draining,
    /// Terminal; all resources released
    Closed,
}

/// Why the receive loop ended
enum StreamEnd {
    /// Explicit `stop` text frame from the client
    ClientStop,
    /// The server asked the session to stop (process shutdown)
    ShutdownRequested,
    /// The engine completed on its own before a stop
    EngineFinished,
    /// Abnormal ending: disconnect, feed failure, engine error, backlog
    Failed(RelayError),
}

impl StreamEnd {
    /// Clean endings get the final acknowledgment frame; abnormal ones close
    /// without it so clients can tell the two apart.
    fn is_clean(&self) -> bool {
        !matches!(self, StreamEnd::Failed(_))
    }

    /// Whether the engine side has already terminated, making a wait for its
    /// completion callback pointless
    fn engine_ended(&self) -> bool {
        matches!(
            self,
            StreamEnd::EngineFinished | StreamEnd::Failed(RelayError::Engine(_))
        )
    }
}

/// Shared view of a running session, held by the server registry
#[derive(Clone)]
pub struct SessionHandle {
    tag: String,
    state: Arc<Mutex<SessionState>>,
    stop: Arc<Notify>,
}

impl SessionHandle {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock poisoned")
    }

    /// Ask the session to stop and drain. Safe to call at any point in the
    /// lifecycle, including before the session reaches its loop.
    pub fn request_stop(&self) {
        self.stop.notify_one();
    }
}

/// Owns one duplex client connection end to end.
///
/// Runs the inbound receive loop (audio chunks and control messages) and a
/// concurrent drain loop that delivers queued transcription events in order.
/// The session only terminates after every in-flight event has been flushed
/// or the drain timeout expires.
pub struct RelaySession {
    config: SessionConfig,
    bridge: RecognitionBridge,
    queue: Arc<TranscriptQueue>,
    state: Arc<Mutex<SessionState>>,
    stop_requested: Arc<Notify>,
}

impl RelaySession {
    pub fn new(
        config: SessionConfig,
        engine: Arc<dyn RecognitionEngine>,
        engine_config: EngineConfig,
    ) -> Self {
        let queue = Arc::new(TranscriptQueue::new());
        let bridge = RecognitionBridge::new(
            config.tag.clone(),
            engine,
            engine_config,
            Arc::clone(&queue),
            config.max_pending_events,
        );

        Self {
            config,
            bridge,
            queue,
            state: Arc::new(Mutex::new(SessionState::Starting)),
            stop_requested: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tag: self.config.tag.clone(),
            state: Arc::clone(&self.state),
            stop: Arc::clone(&self.stop_requested),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state lock poisoned")
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().expect("session state lock poisoned") = state;
        debug!("[{}] State -> {:?}", self.config.tag, state);
    }

    /// Drive the session to completion. Consumes the session; when this
    /// returns, the connection, engine stream and queue are all released.
    pub async fn run(mut self, socket: WebSocket) -> Result<SessionStats, RelayError> {
        let tag = self.config.tag.clone();
        let started_at = Utc::now();

        self.set_state(SessionState::Starting);
        let mut signals = match self.bridge.start().await {
            Ok(signals) => signals,
            Err(e) => {
                // Abnormal close in Starting: no events were ever produced
                error!("[{}] Failed to start recognition: {}", tag, e);
                self.set_state(SessionState::Closed);
                return Err(e);
            }
        };
        self.set_state(SessionState::Streaming);

        let (sink, mut stream) = socket.split();

        let mut capture = self.open_capture();

        // Outbound drain loop: the single consumer of the queue. FIFO order
        // plus a single consumer is what preserves sequence order on the wire.
        let queue = Arc::clone(&self.queue);
        let drain_tag = tag.clone();
        let mut drain_task = tokio::spawn(drain_events(queue, sink, drain_tag));

        let mut audio_bytes: u64 = 0;

        // Inbound receive loop, interleaved with engine signals and
        // server-initiated stop requests
        let end = loop {
            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(Message::Binary(data))) => {
                        audio_bytes += data.len() as u64;
                        if let Some(writer) = capture.as_mut() {
                            if let Err(e) = writer.write(&data) {
                                warn!("[{}] Audio capture stopped: {}", tag, e);
                                capture = None;
                            }
                        }
                        if let Err(e) = self.bridge.feed(&data).await {
                            error!("[{}] {}", tag, e);
                            break StreamEnd::Failed(e);
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if text == STOP_COMMAND {
                            info!("[{}] Stop requested by client", tag);
                            break StreamEnd::ClientStop;
                        }
                        warn!("[{}] Unexpected text frame: {}", tag, text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("[{}] Client disconnected", tag);
                        break StreamEnd::Failed(RelayError::ClientDisconnected);
                    }
                    Some(Ok(_)) => {} // ping/pong
                    Some(Err(e)) => {
                        info!("[{}] Client read failed: {}", tag, e);
                        break StreamEnd::Failed(RelayError::ClientDisconnected);
                    }
                },
                signal = signals.recv() => match signal {
                    Some(EngineSignal::Failed(diag)) => {
                        let err = RelayError::Engine(diag);
                        error!("[{}] {}", tag, err);
                        break StreamEnd::Failed(err);
                    }
                    Some(EngineSignal::Completed) => {
                        info!("[{}] Engine finished before stop", tag);
                        break StreamEnd::EngineFinished;
                    }
                    Some(EngineSignal::Backlogged { pending }) => {
                        let err = RelayError::SlowClient(pending);
                        warn!("[{}] Closing session: {}", tag, err);
                        break StreamEnd::Failed(err);
                    }
                    None => {
                        error!("[{}] Engine signal channel closed unexpectedly", tag);
                        break StreamEnd::Failed(RelayError::Engine(
                            EngineDiagnostic::message("engine signal channel closed"),
                        ));
                    }
                },
                _ = self.stop_requested.notified() => {
                    info!("[{}] Stop requested by server", tag);
                    break StreamEnd::ShutdownRequested;
                }
            }
        };

        // No further audio accepted from here on
        self.set_state(SessionState::Stopping);
        if let Err(e) = self.bridge.stop().await {
            warn!("[{}] Engine stop failed: {}", tag, e);
        }

        // Give the engine a bounded window to flush buffered recognition;
        // every event it emits before completing still reaches the queue.
        if !end.engine_ended() {
            self.await_engine_flush(&mut signals).await;
        }

        // All events the engine will ever produce are queued; close the queue
        // and wait for the drain loop to hand the connection back.
        self.set_state(SessionState::Draining);
        self.queue.close();

        let mut delivered = 0;
        let mut acked = false;
        match tokio::time::timeout(self.config.drain_timeout, &mut drain_task).await {
            Ok(Ok((mut sink, sent, client_alive))) => {
                delivered = sent;
                if end.is_clean() && client_alive {
                    match sink.send(Message::Text(STOP_ACK.to_string())).await {
                        Ok(()) => {
                            acked = true;
                            info!("[{}] Session stopped and acknowledged", tag);
                        }
                        Err(e) => debug!("[{}] Ack send failed: {}", tag, e),
                    }
                }
                let _ = sink.close().await;
            }
            Ok(Err(e)) => {
                error!("[{}] Drain task failed: {}", tag, e);
            }
            Err(_) => {
                warn!(
                    "[{}] Drain timed out after {:?} with {} events pending",
                    tag,
                    self.config.drain_timeout,
                    self.queue.len()
                );
                drain_task.abort();
            }
        }

        self.set_state(SessionState::Closed);

        if let Some(writer) = capture.take() {
            match writer.finalize() {
                Ok(path) => info!("[{}] Audio captured to {}", tag, path.display()),
                Err(e) => warn!("[{}] {}", tag, e),
            }
        }

        let stats = SessionStats {
            started_at,
            duration_secs: (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0,
            audio_bytes,
            events_delivered: delivered,
            clean_stop: acked,
        };
        info!(
            "[{}] Session closed: {} events delivered, {} audio bytes, {:.1}s",
            tag, stats.events_delivered, stats.audio_bytes, stats.duration_secs
        );

        Ok(stats)
    }

    fn open_capture(&self) -> Option<CaptureWriter> {
        let dir = self.config.capture_dir.as_deref()?;
        match CaptureWriter::create(dir, &self.config.tag, self.config.sample_rate) {
            Ok(writer) => Some(writer),
            Err(e) => {
                warn!("[{}] Audio capture disabled: {}", self.config.tag, e);
                None
            }
        }
    }

    async fn await_engine_flush(&self, signals: &mut mpsc::UnboundedReceiver<EngineSignal>) {
        let tag = &self.config.tag;
        let flushed = async {
            while let Some(signal) = signals.recv().await {
                match signal {
                    EngineSignal::Completed => return,
                    EngineSignal::Failed(diag) => {
                        error!("[{}] Engine error while stopping: {}", tag, diag);
                        return;
                    }
                    EngineSignal::Backlogged { .. } => {} // already stopping
                }
            }
        };

        if tokio::time::timeout(self.config.engine_flush_timeout, flushed)
            .await
            .is_err()
        {
            warn!(
                "[{}] Engine did not confirm completion within {:?}",
                tag, self.config.engine_flush_timeout
            );
        }
    }
}

/// Pops queued events and sends them to the client in order until the queue
/// is closed and empty. Returns the sink so the coordinator can append the
/// final acknowledgment after draining completes.
///
/// If a send fails the client is gone; the loop keeps consuming so the drain
/// still completes logically, with delivery as a no-op.
async fn drain_events(
    queue: Arc<TranscriptQueue>,
    mut sink: ClientSink,
    tag: String,
) -> (ClientSink, u64, bool) {
    let mut delivered: u64 = 0;
    let mut client_alive = true;

    while let Some(event) = queue.next().await {
        if !client_alive {
            continue;
        }

        let frame = TranscriptFrame::from(&event);
        let payload = match serde_json::to_string(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                error!("[{}] Failed to serialize event {}: {}", tag, event.sequence, e);
                continue;
            }
        };

        match sink.send(Message::Text(payload)).await {
            Ok(()) => {
                debug!(
                    "[{}] Delivered event {} (final={})",
                    tag, event.sequence, event.is_final
                );
                delivered += 1;
            }
            Err(e) => {
                debug!("[{}] Client send failed, delivery disabled: {}", tag, e);
                client_alive = false;
            }
        }
    }

    (sink, delivered, client_alive)
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{EngineDiagnostic, RelayError};

use super::{EngineConfig, EngineStream, RecognitionEngine, RecognitionObserver, RecognitionResult};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const START_TIMEOUT: Duration = Duration::from_secs(10);

/// DashScope real-time recognition over the duplex WebSocket inference API.
///
/// One `open` call maps to one run-task/finish-task exchange: audio goes out
/// as binary frames, results come back as `result-generated` events until
/// `task-finished` or `task-failed`.
pub struct DashScopeEngine {
    endpoint: String,
    api_key: String,
}

impl DashScopeEngine {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self { endpoint, api_key }
    }
}

#[async_trait]
impl RecognitionEngine for DashScopeEngine {
    async fn open(
        &self,
        config: &EngineConfig,
        observer: Arc<dyn RecognitionObserver>,
    ) -> Result<Box<dyn EngineStream>, RelayError> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::EngineStart(format!("bad endpoint: {}", e)))?;
        let auth = format!("bearer {}", self.api_key)
            .parse()
            .map_err(|e| RelayError::EngineStart(format!("bad api key: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| RelayError::EngineStart(format!("connect failed: {}", e)))?;
        let (mut tx, mut rx) = ws.split();

        let task_id = uuid::Uuid::new_v4().simple().to_string();
        let run_task = run_task_envelope(&task_id, config);
        tx.send(Message::Text(run_task.to_string()))
            .await
            .map_err(|e| RelayError::EngineStart(format!("run-task send failed: {}", e)))?;

        wait_for_task_started(&mut rx, &task_id).await?;
        observer.on_open();

        tokio::spawn(receive_events(rx, observer));

        Ok(Box::new(DashScopeStream {
            sink: tx,
            task_id,
            finished: false,
        }))
    }
}

struct DashScopeStream {
    sink: WsSink,
    task_id: String,
    finished: bool,
}

#[async_trait]
impl EngineStream for DashScopeStream {
    async fn feed(&mut self, chunk: &[u8]) -> Result<(), RelayError> {
        if self.finished {
            return Err(RelayError::EngineFeed(
                "audio after finish-task".to_string(),
            ));
        }
        self.sink
            .send(Message::Binary(chunk.to_vec()))
            .await
            .map_err(|e| RelayError::EngineFeed(e.to_string()))
    }

    async fn stop(&mut self) -> Result<(), RelayError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let finish = json!({
            "header": {
                "action": "finish-task",
                "task_id": self.task_id,
                "streaming": "duplex",
            },
            "payload": {
                "input": {},
            },
        });
        self.sink
            .send(Message::Text(finish.to_string()))
            .await
            .map_err(|e| RelayError::EngineFeed(format!("finish-task send failed: {}", e)))
    }
}

fn run_task_envelope(task_id: &str, config: &EngineConfig) -> serde_json::Value {
    let mut parameters = json!({
        "format": config.format,
        "sample_rate": config.sample_rate,
        "language_hints": config.language_hints,
        "semantic_punctuation_enabled": config.semantic_punctuation,
    });
    if let Some(id) = &config.vocabulary_id {
        parameters["vocabulary_id"] = json!(id);
    }

    json!({
        "header": {
            "action": "run-task",
            "task_id": task_id,
            "streaming": "duplex",
        },
        "payload": {
            "task_group": "audio",
            "task": "asr",
            "function": "recognition",
            "model": config.model,
            "parameters": parameters,
            "input": {},
        },
    })
}

/// Engine event envelope, as far as this relay needs to read it
#[derive(Debug, Deserialize)]
struct Envelope {
    header: EnvelopeHeader,
    #[serde(default)]
    payload: Option<EnvelopePayload>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeHeader {
    event: String,
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopePayload {
    #[serde(default)]
    output: Option<EnvelopeOutput>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeOutput {
    #[serde(default)]
    sentence: Option<Sentence>,
}

#[derive(Debug, Deserialize)]
struct Sentence {
    #[serde(default)]
    text: String,
    #[serde(default)]
    sentence_end: bool,
}

impl EnvelopeHeader {
    fn diagnostic(&self) -> EngineDiagnostic {
        EngineDiagnostic {
            code: self.error_code.clone(),
            message: self
                .error_message
                .clone()
                .unwrap_or_else(|| "engine task failed".to_string()),
            request_id: self.task_id.clone(),
        }
    }
}

async fn wait_for_task_started(rx: &mut WsSource, task_id: &str) -> Result<(), RelayError> {
    let started = async {
        while let Some(msg) = rx.next().await {
            let msg = msg.map_err(|e| RelayError::EngineStart(e.to_string()))?;
            let Message::Text(text) = msg else { continue };
            let envelope: Envelope = serde_json::from_str(&text)
                .map_err(|e| RelayError::EngineStart(format!("bad envelope: {}", e)))?;
            match envelope.header.event.as_str() {
                "task-started" => return Ok(()),
                "task-failed" => {
                    return Err(RelayError::EngineStart(
                        envelope.header.diagnostic().to_string(),
                    ))
                }
                other => debug!("Ignoring {} before task-started (task {})", other, task_id),
            }
        }
        Err(RelayError::EngineStart(
            "engine closed before task-started".to_string(),
        ))
    };

    tokio::time::timeout(START_TIMEOUT, started)
        .await
        .map_err(|_| RelayError::EngineStart("timed out waiting for task-started".to_string()))?
}

/// Engine-owned receive task: the foreign context all observer callbacks run
/// on. Ends when the engine closes the stream or the task finishes/fails.
async fn receive_events(mut rx: WsSource, observer: Arc<dyn RecognitionObserver>) {
    while let Some(msg) = rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                observer.on_error(EngineDiagnostic::message(format!(
                    "engine stream error: {}",
                    e
                )));
                break;
            }
        };

        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let envelope: Envelope = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                warn!("Unparseable engine event: {}", e);
                continue;
            }
        };

        match envelope.header.event.as_str() {
            "result-generated" => {
                let sentence = envelope
                    .payload
                    .and_then(|p| p.output)
                    .and_then(|o| o.sentence);
                if let Some(sentence) = sentence {
                    if !sentence.text.is_empty() {
                        observer.on_event(RecognitionResult {
                            text: sentence.text,
                            sentence_end: sentence.sentence_end,
                        });
                    }
                }
            }
            "task-finished" => {
                observer.on_complete();
                break;
            }
            "task-failed" => {
                observer.on_error(envelope.header.diagnostic());
                break;
            }
            other => debug!("Ignoring engine event {}", other),
        }
    }

    observer.on_close();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_task_envelope_shape() {
        let config = EngineConfig {
            model: "paraformer-realtime-v2".to_string(),
            vocabulary_id: Some("vocab-123".to_string()),
            format: "pcm".to_string(),
            sample_rate: 16000,
            language_hints: vec!["zh".to_string(), "en".to_string()],
            semantic_punctuation: false,
        };

        let envelope = run_task_envelope("abc", &config);
        assert_eq!(envelope["header"]["action"], "run-task");
        assert_eq!(envelope["header"]["streaming"], "duplex");
        assert_eq!(envelope["payload"]["model"], "paraformer-realtime-v2");
        assert_eq!(envelope["payload"]["parameters"]["sample_rate"], 16000);
        assert_eq!(
            envelope["payload"]["parameters"]["vocabulary_id"],
            "vocab-123"
        );
    }

    #[test]
    fn test_run_task_envelope_without_vocabulary() {
        let config = EngineConfig {
            model: "paraformer-realtime-v2".to_string(),
            vocabulary_id: None,
            format: "pcm".to_string(),
            sample_rate: 16000,
            language_hints: vec![],
            semantic_punctuation: true,
        };

        let envelope = run_task_envelope("abc", &config);
        assert!(envelope["payload"]["parameters"]
            .get("vocabulary_id")
            .is_none());
        assert_eq!(
            envelope["payload"]["parameters"]["semantic_punctuation_enabled"],
            true
        );
    }

    #[test]
    fn test_result_envelope_parsing() {
        let json = r#"{
            "header": {"event": "result-generated", "task_id": "abc"},
            "payload": {"output": {"sentence": {"text": "hello", "sentence_end": false}}}
        }"#;

        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.header.event, "result-generated");
        let sentence = envelope.payload.unwrap().output.unwrap().sentence.unwrap();
        assert_eq!(sentence.text, "hello");
        assert!(!sentence.sentence_end);
    }

    #[test]
    fn test_failure_envelope_parsing() {
        let json = r#"{
            "header": {
                "event": "task-failed",
                "task_id": "abc",
                "error_code": "InvalidParameter",
                "error_message": "bad vocabulary"
            }
        }"#;

        let envelope: Envelope = serde_json::from_str(json).unwrap();
        let diag = envelope.header.diagnostic();
        assert_eq!(diag.code.as_deref(), Some("InvalidParameter"));
        assert_eq!(diag.request_id.as_deref(), Some("abc"));
        assert!(diag.to_string().contains("bad vocabulary"));
    }
}

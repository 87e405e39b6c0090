use crate::engine::{EngineConfig, RecognitionEngine};
use crate::session::{SessionConfig, SessionHandle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shared application state for the WebSocket endpoint.
///
/// Everything here is read-only per session except the registry of handles,
/// which exists solely so process shutdown can ask every session to stop and
/// drain.
#[derive(Clone)]
pub struct AppState {
    /// Recognition engine shared by all sessions (stateless factory)
    pub engine: Arc<dyn RecognitionEngine>,

    /// Engine parameters applied to every session, resolved once at startup
    pub engine_config: EngineConfig,

    /// Per-session settings; the tag is regenerated per connection
    session_template: SessionConfig,

    /// Active sessions (tag → handle)
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        engine_config: EngineConfig,
        session_template: SessionConfig,
    ) -> Self {
        Self {
            engine,
            engine_config,
            session_template,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Session settings for a new connection, with a fresh tag
    pub fn new_session_config(&self) -> SessionConfig {
        let mut config = self.session_template.clone();
        config.tag = format!("session-{}", uuid::Uuid::new_v4());
        config
    }

    pub async fn register(&self, handle: SessionHandle) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(handle.tag().to_string(), handle);
    }

    pub async fn deregister(&self, tag: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(tag);
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Ask every active session to stop, then wait for them to drain and
    /// deregister, bounded by `grace`.
    pub async fn stop_all(&self, grace: Duration) {
        let handles: Vec<SessionHandle> = {
            let sessions = self.sessions.read().await;
            sessions.values().cloned().collect()
        };

        if handles.is_empty() {
            return;
        }

        info!("Stopping {} active session(s)", handles.len());
        for handle in &handles {
            handle.request_stop();
        }

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if self.session_count().await == 0 {
                info!("All sessions drained");
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "{} session(s) still active after {:?} grace period",
                    self.session_count().await,
                    grace
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

use super::state::AppState;
use crate::session::RelaySession;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.session_count().await,
    })
}

/// GET /asr
/// Upgrade to a duplex streaming recognition session
pub async fn asr_stream(
    State(state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_session(state, socket))
}

/// Run one session to completion, independently of all other sessions
async fn handle_session(state: AppState, socket: WebSocket) {
    let config = state.new_session_config();
    let tag = config.tag.clone();
    info!("[{}] Client connected", tag);

    let session = RelaySession::new(config, Arc::clone(&state.engine), state.engine_config.clone());
    state.register(session.handle()).await;

    match session.run(socket).await {
        Ok(stats) => {
            info!(
                "[{}] Session finished (clean_stop={}, events={}, audio_bytes={})",
                tag, stats.clean_stop, stats.events_delivered, stats.audio_bytes
            );
        }
        Err(e) => {
            error!("[{}] Session aborted: {}", tag, e);
        }
    }

    state.deregister(&tag).await;
}

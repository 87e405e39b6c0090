//! Relay session management
//!
//! This module provides the `RelaySession` abstraction that manages:
//! - The duplex WebSocket with one client
//! - Forwarding inbound PCM into the recognition engine
//! - Ordered delivery of transcription events back to the client
//! - Lifecycle state and drain-before-close shutdown

mod config;
mod events;
mod queue;
mod session;
mod stats;

pub use config::SessionConfig;
pub use events::{TranscriptFrame, TranscriptionEvent, STOP_ACK, STOP_COMMAND};
pub use queue::TranscriptQueue;
pub use session::{RelaySession, SessionHandle, SessionState};
pub use stats::SessionStats;

//! WebSocket endpoint for client sessions
//!
//! This module accepts duplex client connections and runs one relay session
//! per connection:
//! - GET /asr - WebSocket upgrade, binary frames in / JSON transcript frames out
//! - GET /health - Health check
//!
//! Active sessions are tracked only for clean process shutdown; they share
//! nothing else.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

//! Transport layer for collaborative editing clients.
//!
//! Provides:
//! - Wire protocol (JSON, camelCase fields)
//! - HTTP routes for create / join / send-update / diagram requests
//! - WebSocket subscription stream

pub mod error;
pub mod protocol;
pub mod routes;
pub mod websocket;

pub use error::ApiError;
pub use protocol::{ClientMessage, ServerMessage};
pub use routes::{AppState, create_router};

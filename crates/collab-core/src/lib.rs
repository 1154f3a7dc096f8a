//! Core types for collaborative editing sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionId` / `ReplicaId` - Session and participant identity
//! - `UpdateRecord` - Unit of history and of delivery
//! - `UpdateHistory` - Append-only log for late-joiner replay
//! - `CollabError` - Error kinds shared by every layer

pub mod error;
pub mod history;
pub mod token;
pub mod types;

pub use error::CollabError;
pub use history::UpdateHistory;
pub use token::generate_session_id;
pub use types::{Node, ReplicaId, SessionId, UpdateRecord};

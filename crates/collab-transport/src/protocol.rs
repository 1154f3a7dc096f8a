//! Wire protocol for client-server communication.

use collab_core::{CollabError, Node, ReplicaId, SessionId, UpdateRecord};
use serde::{Deserialize, Serialize};

/// Status returned when a local update was accepted.
pub const UPDATE_ACCEPTED: &str = "Successfully received local update";

/// Response to a create-session request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    pub session_id: SessionId,
    pub nickname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionResponse {
    pub replica_id: ReplicaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUpdateRequest {
    pub session_id: SessionId,
    pub replica_id: ReplicaId,
    pub node: Node,
}

/// Reply to a local update. Never an error: failures are reported in the
/// status so the sender's edit flow keeps going.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUpdateReply {
    pub status_message: String,
}

impl LocalUpdateReply {
    #[must_use]
    pub fn from_result<T>(result: &Result<T, CollabError>) -> Self {
        let status_message = match result {
            Ok(_) => UPDATE_ACCEPTED.to_string(),
            Err(e) => format!("Update rejected: {e}"),
        };
        Self { status_message }
    }
}

/// Query parameters of the subscribe endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUpdateRequest {
    pub session_id: SessionId,
    pub replica_id: ReplicaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDiagramRequest {
    #[serde(default)]
    pub selected_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDiagramResponse {
    pub plant_uml_code: String,
}

/// Message from client to server on a subscription socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping for keepalive.
    Ping,
}

/// Message from server to client on a subscription socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A replayed or live update. A missing `node` marks a leave notification.
    RemoteUpdate(UpdateRecord),
    /// Error message.
    Error { message: String },
    /// Pong response.
    Pong,
}

impl ServerMessage {
    #[must_use]
    pub fn remote_update(record: &UpdateRecord) -> Self {
        Self::RemoteUpdate(record.clone())
    }

    #[must_use]
    pub fn error(err: &CollabError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

//! Error kinds shared across the session engine and its transports.

use thiserror::Error;

use crate::{ReplicaId, SessionId};

/// Session engine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollabError {
    #[error("Session {0} does not exist")]
    SessionNotFound(SessionId),
    #[error("Replica {replica_id} has not joined session {session_id}")]
    ReplicaNotJoined {
        session_id: SessionId,
        replica_id: ReplicaId,
    },
    #[error("Replica {replica_id} is already subscribed to session {session_id}")]
    AlreadySubscribed {
        session_id: SessionId,
        replica_id: ReplicaId,
    },
    /// A null node would be indistinguishable from a leave notification.
    #[error("Replica {replica_id} sent an update without a node to session {session_id}")]
    EmptyUpdate {
        session_id: SessionId,
        replica_id: ReplicaId,
    },
    /// Sending to a connected client failed mid-stream.
    #[error("Delivery failed: {0}")]
    DeliveryFailure(String),
    /// The replica's delivery queue overflowed and it was disconnected.
    #[error("Replica {replica_id} fell behind in session {session_id} and was disconnected")]
    Lagged {
        session_id: SessionId,
        replica_id: ReplicaId,
    },
    #[error("Server is shutting down")]
    ShuttingDown,
    #[error("Failed to generate session token: {0}")]
    TokenGeneration(String),
}

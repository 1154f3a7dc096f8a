//! Mapping of session errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use collab_core::CollabError;

use crate::ServerMessage;

/// Request failure returned by the HTTP handlers.
#[derive(Debug)]
pub struct ApiError(CollabError);

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            CollabError::SessionNotFound(_) | CollabError::ReplicaNotJoined { .. } => {
                StatusCode::NOT_FOUND
            }
            CollabError::AlreadySubscribed { .. } => StatusCode::CONFLICT,
            CollabError::EmptyUpdate { .. } => StatusCode::BAD_REQUEST,
            CollabError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            CollabError::DeliveryFailure(_)
            | CollabError::Lagged { .. }
            | CollabError::TokenGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn inner(&self) -> &CollabError {
        &self.0
    }
}

impl From<CollabError> for ApiError {
    fn from(err: CollabError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ServerMessage::error(&self.0))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use collab_core::{ReplicaId, SessionId};

    use super::*;

    #[test]
    fn test_status_mapping() {
        let session_id = SessionId::from("S");
        let cases = [
            (CollabError::SessionNotFound(session_id.clone()), StatusCode::NOT_FOUND),
            (
                CollabError::ReplicaNotJoined {
                    session_id: session_id.clone(),
                    replica_id: ReplicaId::FIRST,
                },
                StatusCode::NOT_FOUND,
            ),
            (
                CollabError::AlreadySubscribed {
                    session_id,
                    replica_id: ReplicaId::FIRST,
                },
                StatusCode::CONFLICT,
            ),
            (
                CollabError::EmptyUpdate {
                    session_id: SessionId::from("S"),
                    replica_id: ReplicaId::FIRST,
                },
                StatusCode::BAD_REQUEST,
            ),
            (CollabError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
            (
                CollabError::TokenGeneration("no entropy".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}

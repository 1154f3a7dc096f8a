//! WebSocket subscription stream.
//!
//! One socket carries one subscription: the history replay, then live
//! updates, until the client goes away or the server shuts down.

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use collab_core::CollabError;
use collab_session::Subscription;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use uuid::Uuid;

use crate::{
    ApiError, AppState,
    protocol::{ClientMessage, RemoteUpdateRequest, ServerMessage},
};

/// WebSocket upgrade handler for `SubscribeForRemoteUpdates`.
///
/// The subscription is opened before the upgrade, so unknown sessions,
/// unknown replicas and duplicate subscriptions fail as plain HTTP errors.
pub async fn subscribe_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(request): Query<RemoteUpdateRequest>,
) -> Result<Response, ApiError> {
    let subscription = state
        .registry
        .subscribe(&request.session_id, request.replica_id)
        .inspect_err(|e| {
            tracing::warn!(
                session_id = %request.session_id,
                replica_id = %request.replica_id,
                error = %e,
                "Subscribe rejected"
            );
        })?;

    Ok(ws.on_upgrade(move |socket| forward_updates(socket, subscription)))
}

async fn forward_updates(socket: WebSocket, subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();
    let session_id = subscription.session_id().clone();
    let replica_id = subscription.replica_id();
    let nickname = subscription.nickname().to_string();
    let mut updates = subscription.into_stream();

    tracing::info!(%connection_id, %session_id, %replica_id, %nickname, "Subscription stream opened");

    loop {
        tokio::select! {
            next = updates.next() => {
                let msg = match next {
                    Some(Ok(record)) => ServerMessage::remote_update(&record),
                    Some(Err(e)) => {
                        let _ = send_message(&mut sender, &ServerMessage::error(&e)).await;
                        break;
                    }
                    None => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                };

                if let Err(e) = send_message(&mut sender, &msg).await {
                    let err = CollabError::DeliveryFailure(e.to_string());
                    tracing::warn!(%connection_id, %session_id, %replica_id, error = %err, "Ending subscription");
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Ping) => {
                        if send_message(&mut sender, &ServerMessage::Pong).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(%connection_id, "Invalid client message: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(%connection_id, %session_id, %replica_id, "Client disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(%connection_id, "WebSocket error: {e}");
                    break;
                }
            },
        }
    }

    // Leave cleanup runs here.
    drop(updates);
    tracing::info!(%connection_id, %session_id, %replica_id, "Subscription stream closed");
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}

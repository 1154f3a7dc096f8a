//! Per-replica subscription stream: replay history, then forward live updates.

use std::{collections::VecDeque, sync::Arc};

use collab_core::{CollabError, ReplicaId, SessionId, UpdateRecord};
use futures::{StreamExt, stream::BoxStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    SessionRegistry,
    session::{Attachment, Session},
};

/// Where a subscription is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
    /// Sending the history snapshot taken at subscribe time.
    Replaying,
    /// Draining the live delivery queue.
    Forwarding,
    /// Finished; nothing more will be yielded.
    Closed,
}

/// A replica's open subscription.
///
/// Dropping it, whether after a clean end, a delivery failure, or a
/// cancelled caller, removes the replica from its session and notifies the
/// remaining replicas.
pub struct Subscription {
    registry: Arc<SessionRegistry>,
    session: Arc<Session>,
    replica_id: ReplicaId,
    nickname: String,
    phase: SubscriptionPhase,
    replay: VecDeque<Arc<UpdateRecord>>,
    live: mpsc::Receiver<Arc<UpdateRecord>>,
    shutdown: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(
        registry: Arc<SessionRegistry>,
        session: Arc<Session>,
        replica_id: ReplicaId,
        attachment: Attachment,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            session,
            replica_id,
            nickname: attachment.nickname,
            phase: SubscriptionPhase::Replaying,
            replay: attachment.replay.into(),
            live: attachment.live,
            shutdown,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.session.id()
    }

    #[must_use]
    pub const fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    #[must_use]
    pub const fn phase(&self) -> SubscriptionPhase {
        self.phase
    }

    /// History records not yet yielded.
    #[must_use]
    pub fn replay_remaining(&self) -> usize {
        self.replay.len()
    }

    /// Next record for the client.
    ///
    /// Yields the history snapshot first, then live updates. Returns `None`
    /// once the delivery channel is closed by shutdown. A replica that fell
    /// behind gets a single `Err(CollabError::Lagged)` before `None`.
    ///
    /// Cancel safe: dropping the returned future loses no record.
    pub async fn next(&mut self) -> Option<Result<Arc<UpdateRecord>, CollabError>> {
        if self.phase == SubscriptionPhase::Replaying {
            if let Some(record) = self.replay.pop_front() {
                return Some(Ok(record));
            }
            tracing::debug!(
                session_id = %self.session.id(),
                replica_id = %self.replica_id,
                "Replay complete, forwarding live updates"
            );
            self.phase = SubscriptionPhase::Forwarding;
        }

        if self.phase == SubscriptionPhase::Closed {
            return None;
        }

        let received = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            record = self.live.recv() => record,
        };

        if let Some(record) = received {
            return Some(Ok(record));
        }

        self.phase = SubscriptionPhase::Closed;
        self.live.close();

        if self.shutdown.is_cancelled() {
            tracing::info!(
                session_id = %self.session.id(),
                replica_id = %self.replica_id,
                "Delivery channel closed by shutdown"
            );
            None
        } else {
            tracing::warn!(
                session_id = %self.session.id(),
                replica_id = %self.replica_id,
                "Delivery queue overflowed, ending stream"
            );
            Some(Err(CollabError::Lagged {
                session_id: self.session.id().clone(),
                replica_id: self.replica_id,
            }))
        }
    }

    /// Stream that yields history first, then live updates.
    ///
    /// Leave cleanup runs when the stream is dropped.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Result<Arc<UpdateRecord>, CollabError>> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|item| (item, sub))
        })
        .boxed()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.phase = SubscriptionPhase::Closed;
        tracing::debug!(
            session_id = %self.session.id(),
            replica_id = %self.replica_id,
            nickname = %self.nickname,
            "Subscription ended"
        );
        self.registry.release(&self.session, self.replica_id);
    }
}

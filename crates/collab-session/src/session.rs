//! Session state: replica membership, history and fan-out.

use std::{collections::BTreeMap, sync::Arc};

use collab_core::{CollabError, Node, ReplicaId, SessionId, UpdateHistory, UpdateRecord};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Delivery state of a replica.
#[derive(Debug)]
pub enum ReplicaState {
    /// Joined, no subscription stream open yet.
    Joined,
    /// A subscription stream drains this queue.
    Subscribed(mpsc::Sender<Arc<UpdateRecord>>),
    /// Delivery path torn down (lagging consumer or shutdown). The entry is
    /// removed once its stream finishes cleanup.
    Left,
}

/// One participant of a session.
#[derive(Debug)]
pub struct Replica {
    id: ReplicaId,
    nickname: String,
    state: ReplicaState,
}

impl Replica {
    const fn new(id: ReplicaId, nickname: String) -> Self {
        Self {
            id,
            nickname,
            state: ReplicaState::Joined,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ReplicaId {
        self.id
    }

    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    #[must_use]
    pub const fn state(&self) -> &ReplicaState {
        &self.state
    }

    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        matches!(self.state, ReplicaState::Subscribed(_))
    }
}

/// Point-in-time counters for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub replicas: usize,
    pub subscribed: usize,
    pub history_len: usize,
}

/// What a new subscription starts from: the history snapshot taken in the
/// same critical section that installed its live queue.
pub(crate) struct Attachment {
    pub nickname: String,
    pub replay: Vec<Arc<UpdateRecord>>,
    pub live: mpsc::Receiver<Arc<UpdateRecord>>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LeaveOutcome {
    /// The last replica left; the session is closed and must be dropped
    /// from the registry.
    Emptied,
    /// Remaining replicas were sent a leave notification.
    Notified { remaining: usize },
    NotFound,
}

struct SessionState {
    next_replica_id: ReplicaId,
    replicas: BTreeMap<ReplicaId, Replica>,
    history: UpdateHistory,
    closed: bool,
}

impl SessionState {
    /// Queue `record` for every subscribed replica except its sender.
    ///
    /// Never blocks. A replica whose queue is full or whose stream is gone is
    /// moved to `Left`, which closes its queue.
    fn fan_out(&mut self, session_id: &SessionId, record: &Arc<UpdateRecord>) -> usize {
        let mut delivered = 0;

        for replica in self.replicas.values_mut() {
            if replica.id == record.sender_replica_id {
                continue;
            }
            let ReplicaState::Subscribed(tx) = &replica.state else {
                continue;
            };

            let outcome = tx.try_send(Arc::clone(record));
            match outcome {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        session_id = %session_id,
                        replica_id = %replica.id,
                        nickname = %replica.nickname,
                        "Delivery queue full, disconnecting lagging replica"
                    );
                    replica.state = ReplicaState::Left;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        session_id = %session_id,
                        replica_id = %replica.id,
                        "Delivery queue already closed"
                    );
                    replica.state = ReplicaState::Left;
                }
            }
        }

        delivered
    }
}

/// An editing room: replicas plus the totally ordered history of updates.
///
/// Every mutation takes the session lock, so joins, publishes, subscription
/// hand-offs and leaves of one session never interleave.
pub struct Session {
    id: SessionId,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(id: SessionId) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState {
                next_replica_id: ReplicaId::FIRST,
                replicas: BTreeMap::new(),
                history: UpdateHistory::new(),
                closed: false,
            }),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Add a replica and return its freshly allocated id.
    ///
    /// # Errors
    /// Returns `SessionNotFound` if the session has already been closed.
    pub fn join(&self, nickname: impl Into<String>) -> Result<ReplicaId, CollabError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CollabError::SessionNotFound(self.id.clone()));
        }

        let id = state.next_replica_id;
        state.next_replica_id = id.next();
        state.replicas.insert(id, Replica::new(id, nickname.into()));
        Ok(id)
    }

    /// Append an edit to the history and queue it for every other
    /// subscribed replica.
    ///
    /// # Errors
    /// Returns `SessionNotFound` if the session was closed,
    /// `ReplicaNotJoined` if `sender` is not a member, or `EmptyUpdate` for
    /// a null node.
    pub fn publish(&self, sender: ReplicaId, node: Node) -> Result<Arc<UpdateRecord>, CollabError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CollabError::SessionNotFound(self.id.clone()));
        }

        let nickname = state
            .replicas
            .get(&sender)
            .map(|r| r.nickname.clone())
            .ok_or_else(|| CollabError::ReplicaNotJoined {
                session_id: self.id.clone(),
                replica_id: sender,
            })?;

        if node.is_null() {
            return Err(CollabError::EmptyUpdate {
                session_id: self.id.clone(),
                replica_id: sender,
            });
        }

        let record = state.history.push(UpdateRecord::edit(sender, node, nickname));
        let delivered = state.fan_out(&self.id, &record);
        tracing::debug!(
            session_id = %self.id,
            replica_id = %sender,
            delivered,
            "Broadcast local update"
        );
        Ok(record)
    }

    /// Install a live queue for `replica_id` and snapshot the history in the
    /// same critical section.
    ///
    /// Anything published before this call is in the snapshot, anything after
    /// lands in the queue, so replay and live forwarding never overlap or
    /// leave a gap.
    pub(crate) fn attach(
        &self,
        replica_id: ReplicaId,
        capacity: usize,
    ) -> Result<Attachment, CollabError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CollabError::SessionNotFound(self.id.clone()));
        }

        let SessionState {
            replicas, history, ..
        } = &mut *state;
        let replica = replicas
            .get_mut(&replica_id)
            .ok_or_else(|| CollabError::ReplicaNotJoined {
                session_id: self.id.clone(),
                replica_id,
            })?;

        if !matches!(replica.state, ReplicaState::Joined) {
            return Err(CollabError::AlreadySubscribed {
                session_id: self.id.clone(),
                replica_id,
            });
        }

        let (tx, live) = mpsc::channel(capacity.max(1));
        replica.state = ReplicaState::Subscribed(tx);

        if history.is_empty() {
            tracing::debug!(session_id = %self.id, replica_id = %replica_id, "Nothing to replay");
        }

        Ok(Attachment {
            nickname: replica.nickname.clone(),
            replay: history.snapshot(),
            live,
        })
    }

    /// Remove a replica. Closes the session if it was the last one,
    /// otherwise broadcasts a leave notification to the rest.
    pub(crate) fn leave(&self, replica_id: ReplicaId) -> LeaveOutcome {
        let mut state = self.state.lock();
        let Some(replica) = state.replicas.remove(&replica_id) else {
            return LeaveOutcome::NotFound;
        };

        if state.replicas.is_empty() {
            state.closed = true;
            return LeaveOutcome::Emptied;
        }

        let record = state
            .history
            .push(UpdateRecord::leave(replica_id, replica.nickname));
        let delivered = state.fan_out(&self.id, &record);
        tracing::debug!(
            session_id = %self.id,
            replica_id = %replica_id,
            delivered,
            "Broadcast leave notification"
        );

        LeaveOutcome::Notified {
            remaining: state.replicas.len(),
        }
    }

    /// Close every delivery queue in this session. Returns how many were open.
    pub(crate) fn close_delivery(&self) -> usize {
        let mut state = self.state.lock();
        let mut closed = 0;
        for replica in state.replicas.values_mut() {
            if replica.is_subscribed() {
                replica.state = ReplicaState::Left;
                closed += 1;
            }
        }
        closed
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn history(&self) -> Vec<Arc<UpdateRecord>> {
        self.state.lock().history.snapshot()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        let state = self.state.lock();
        SessionStats {
            replicas: state.replicas.len(),
            subscribed: state
                .replicas
                .values()
                .filter(|r| r.is_subscribed())
                .count(),
            history_len: state.history.len(),
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

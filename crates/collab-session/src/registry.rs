//! Process-wide table of live sessions.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use collab_core::{CollabError, Node, ReplicaId, SessionId, UpdateRecord, generate_session_id};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::{
    RegistryConfig, Subscription,
    session::{LeaveOutcome, Session, SessionStats},
};

/// Session registry.
///
/// Owns every live session. Construct one per process, share it behind an
/// `Arc`, and call [`SessionRegistry::shutdown`] before exit so open
/// subscription streams end cleanly.
pub struct SessionRegistry {
    config: RegistryConfig,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    shutdown: CancellationToken,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Create a new, empty session.
    ///
    /// # Errors
    /// Returns error if the registry is shutting down or no session token
    /// could be generated.
    pub fn create_session(&self) -> Result<SessionId, CollabError> {
        if self.is_shutting_down() {
            return Err(CollabError::ShuttingDown);
        }

        loop {
            let id = generate_session_id()?;
            let mut sessions = self.sessions.write();
            if let Entry::Vacant(entry) = sessions.entry(id.clone()) {
                entry.insert(Arc::new(Session::new(id.clone())));
                drop(sessions);
                tracing::info!(session_id = %id, "Session created");
                return Ok(id);
            }
        }
    }

    /// Look up a live session.
    #[must_use]
    pub fn lookup(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(session_id).map(Arc::clone)
    }

    fn get(&self, session_id: &SessionId) -> Result<Arc<Session>, CollabError> {
        self.lookup(session_id)
            .ok_or_else(|| CollabError::SessionNotFound(session_id.clone()))
    }

    /// Remove a session. Returns whether it was present.
    pub fn delete(&self, session_id: &SessionId) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    /// Join a session as a new replica.
    ///
    /// # Errors
    /// Returns `ShuttingDown`, or `SessionNotFound` if the session does not
    /// exist.
    pub fn join_session(
        &self,
        session_id: &SessionId,
        nickname: impl Into<String>,
    ) -> Result<ReplicaId, CollabError> {
        if self.is_shutting_down() {
            return Err(CollabError::ShuttingDown);
        }

        let nickname = nickname.into();
        let replica_id = self.get(session_id)?.join(nickname.clone())?;
        tracing::info!(
            session_id = %session_id,
            replica_id = %replica_id,
            nickname = %nickname,
            "Replica joined"
        );
        Ok(replica_id)
    }

    /// Publish a local update from `sender` to the rest of the session.
    ///
    /// # Errors
    /// Returns `SessionNotFound` or `ReplicaNotJoined`.
    pub fn publish(
        &self,
        session_id: &SessionId,
        sender: ReplicaId,
        node: Node,
    ) -> Result<Arc<UpdateRecord>, CollabError> {
        self.get(session_id)?.publish(sender, node)
    }

    /// Open the subscription stream for a joined replica.
    ///
    /// # Errors
    /// Returns `ShuttingDown`, `SessionNotFound`, `ReplicaNotJoined` or
    /// `AlreadySubscribed`.
    pub fn subscribe(
        self: &Arc<Self>,
        session_id: &SessionId,
        replica_id: ReplicaId,
    ) -> Result<Subscription, CollabError> {
        if self.is_shutting_down() {
            return Err(CollabError::ShuttingDown);
        }

        let session = self.get(session_id)?;
        let attachment = session.attach(replica_id, self.config.queue_capacity)?;
        tracing::info!(
            session_id = %session_id,
            replica_id = %replica_id,
            replay = attachment.replay.len(),
            "Replica subscribed for remote updates"
        );

        Ok(Subscription::new(
            Arc::clone(self),
            session,
            replica_id,
            attachment,
            self.shutdown.clone(),
        ))
    }

    /// Leave cleanup for a replica whose stream has ended.
    pub(crate) fn release(&self, session: &Arc<Session>, replica_id: ReplicaId) {
        match session.leave(replica_id) {
            LeaveOutcome::Emptied => {
                let mut sessions = self.sessions.write();
                if sessions
                    .get(session.id())
                    .is_some_and(|current| Arc::ptr_eq(current, session))
                {
                    sessions.remove(session.id());
                }
                drop(sessions);
                tracing::info!(session_id = %session.id(), "Last replica left, closing session");
            }
            LeaveOutcome::Notified { remaining } => {
                tracing::info!(
                    session_id = %session.id(),
                    replica_id = %replica_id,
                    remaining,
                    "Replica left session"
                );
            }
            LeaveOutcome::NotFound => {}
        }
    }

    /// Close every open delivery channel.
    ///
    /// Forwarding streams observe this as a clean end and run their normal
    /// leave cleanup. New sessions and subscriptions are refused afterwards.
    pub fn shutdown(&self) {
        self.shutdown.cancel();

        let sessions: Vec<Arc<Session>> = self.sessions.read().values().map(Arc::clone).collect();
        let mut channels = 0;
        for session in &sessions {
            let closed = session.close_delivery();
            if closed > 0 {
                tracing::info!(session_id = %session.id(), channels = closed, "Closed delivery channels");
            }
            channels += closed;
        }

        tracing::info!(sessions = sessions.len(), channels, "Session registry shut down");
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Counters for one session.
    #[must_use]
    pub fn stats(&self, session_id: &SessionId) -> Option<SessionStats> {
        self.lookup(session_id).map(|s| s.stats())
    }
}

//! Identifiers and the update record.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing token.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Replica identifier, unique within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(i64);

impl ReplicaId {
    /// First id handed out by a session.
    pub const FIRST: Self = Self(0);

    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// The id allocated after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque edit payload.
///
/// The document model lives on the clients; the server only stores and
/// forwards it in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Node(Value);

impl Node {
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Whether the payload is JSON `null`, which the wire format cannot
    /// tell apart from an absent node.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self.0, Value::Null)
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One broadcast update.
///
/// A record without a node is a leave notification: `sender_replica_id`
/// and `nickname` then describe the replica that left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord {
    /// Author of the update, or the departed replica for leave notifications.
    pub sender_replica_id: ReplicaId,
    /// Edit payload; absent for leave notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    /// Sender's display name.
    pub nickname: String,
}

impl UpdateRecord {
    /// An edit published by a replica.
    #[must_use]
    pub fn edit(sender: ReplicaId, node: Node, nickname: impl Into<String>) -> Self {
        Self {
            sender_replica_id: sender,
            node: Some(node),
            nickname: nickname.into(),
        }
    }

    /// A system-generated notification that `replica` left the session.
    #[must_use]
    pub fn leave(replica: ReplicaId, nickname: impl Into<String>) -> Self {
        Self {
            sender_replica_id: replica,
            node: None,
            nickname: nickname.into(),
        }
    }

    #[must_use]
    pub const fn is_leave(&self) -> bool {
        self.node.is_none()
    }
}

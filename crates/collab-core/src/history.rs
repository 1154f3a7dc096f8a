//! Append-only update history for late-joiner replay.

use std::sync::Arc;

use crate::UpdateRecord;

/// Ordered log of every update broadcast in a session, oldest first.
///
/// Records are shared with the delivery queues, so a snapshot is a cheap
/// vector of reference-counted handles. The history is not synchronized on
/// its own; the owning session serializes access.
#[derive(Debug, Default)]
pub struct UpdateHistory {
    records: Vec<Arc<UpdateRecord>>,
}

impl UpdateHistory {
    /// Create an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a record and return the shared handle that was stored.
    pub fn push(&mut self, record: UpdateRecord) -> Arc<UpdateRecord> {
        let record = Arc::new(record);
        self.records.push(Arc::clone(&record));
        record
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<UpdateRecord>> {
        self.records.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

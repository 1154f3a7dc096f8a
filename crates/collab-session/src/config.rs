//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Default per-replica delivery queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Configuration for the session registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Updates buffered per subscribed replica before it is disconnected
    /// as lagging.
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Override the delivery queue capacity. Zero is raised to one.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

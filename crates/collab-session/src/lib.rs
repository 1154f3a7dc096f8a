//! Session registry and update broadcast for collaborative editing.
//!
//! Provides:
//! - `SessionRegistry` - Create, look up and tear down sessions
//! - `Session` - Replica membership, history and fan-out
//! - `Subscription` - Replay-then-forward stream for one replica

pub mod config;
pub mod registry;
pub mod session;
pub mod subscription;

pub use config::RegistryConfig;
pub use registry::SessionRegistry;
pub use session::{Replica, ReplicaState, Session, SessionStats};
pub use subscription::{Subscription, SubscriptionPhase};

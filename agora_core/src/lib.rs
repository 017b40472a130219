//! Agora Core - Social-Content Domain and Content Engine
//!
//! This library holds the shared domain state of the Agora backend and the
//! single engine that serializes every write to it:
//! 1. **Domain Store**: users, communities, posts, comments, vote ledger
//! 2. **Content Engine**: mailbox task, one store operation per request
//! 3. **Metrics**: lock-free counters and histograms shared process-wide

pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod store;
pub mod validation;

// Re-export key types for convenience
pub use engine::{ContentEngine, EngineHandle};
pub use error::{EntityKind, StoreError};
pub use metrics::{ActionKind, AgoraMetrics, MetricsSnapshot, PersonaStats};
pub use models::{Comment, Community, Post, User};
pub use store::{DomainStore, MemoryStore};

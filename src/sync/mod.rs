//! Synchronization Module
//!
//! Keeps the local store consistent with a batch of independent remote
//! resources without re-downloading unchanged data:
//!
//! - `engine`: runs a batch of jobs through decide, fetch and commit.
//! - `job`: resource traits and the type-erased `Job` the engine consumes.
//! - `digest_store`: durable resource-key to digest mapping.
//! - `events`: batch lifecycle events and their handlers.
//! - `progress`: per-batch bookkeeping and the resulting `SyncReport`.
//! - `types`: keys, digests and the error taxonomy.

/// Persistent digest bookkeeping
pub mod digest_store;
/// The batch orchestrator
pub mod engine;
/// Event system for observing batches
pub mod events;
/// Resource traits and jobs
pub mod job;
/// Tracks batch decisions and builds reports
pub mod progress;
/// Keys, digests and errors
pub mod types;

pub use digest_store::{DigestStore, FileDigestStore, MemoryDigestStore};
pub use engine::{LocalStore, SyncConfig, SyncEngine};
pub use events::{EventDispatcher, StatusHandler, SyncEvent, SyncEventHandler, SyncStatus};
pub use job::{DigestedResource, Job, Resource};
pub use progress::SyncReport;
pub use types::*;

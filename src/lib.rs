//! quotesync - quote collection core with client-server synchronization.
//!
//! This library provides:
//! - Data models (Quote, ConflictEntry)
//! - A local quote store mirrored to SQLite
//! - The merge engine reconciling local quotes against a remote snapshot
//! - A conflict queue resolved in favor of the remote copy
//! - A sync client running push-then-pull cycles, one at a time
//! - A scheduler running cycles on a fixed interval and on demand
//! - Configuration management
//!
//! # Feature Flags
//!
//! - `server`: Include the simulated remote quote server (axum). Not needed for clients.
//! - `desktop`: Detect the platform config directory when none is given.

pub mod config;
pub mod conflicts;
pub mod error;
pub mod merge;
pub mod models;
pub mod observer;
pub mod persistence;
pub mod remote;
pub mod scheduler;
pub mod store;
pub mod sync_client;
#[cfg(feature = "server")]
pub mod sync_server;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use conflicts::ConflictQueue;
pub use error::{QuoteError, QuoteResult};
pub use merge::{reconcile, Reconciliation};
pub use models::{ConflictEntry, Origin, Quote, SyncStats};
pub use observer::{Severity, SyncObserver, TracingObserver};
pub use persistence::{Persistence, SqlitePersistence};
pub use remote::{HttpRemote, InMemoryRemote, PostResult, RemoteSource};
pub use scheduler::{Scheduler, SchedulerState};
pub use store::LocalStore;
pub use sync_client::{SyncClient, SyncOutcome, SyncResult};

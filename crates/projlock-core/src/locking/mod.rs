//! Scoped locking for the shared project collection
//!
//! # Architecture
//!
//! - **Manager**: [`LockManager`] drives the reader/writer lock around the
//!   [`crate::model::ProjectCollection`], with cancellation- and
//!   timeout-aware acquisition.
//! - **Handles**: [`ReadLockHandle`], [`UpgradeableReadLockHandle`],
//!   [`WriteLockHandle`] — scoped proofs that a lock is held, released on
//!   every exit path.
//! - **Events**: [`LockEvent`] lifecycle records on a broadcast channel.
//! - **Metrics**: [`LockMetrics`] counters with immutable snapshots.
//!
//! Lock compatibility: any number of read scopes run concurrently; an
//! upgradeable-read scope runs alongside plain reads but excludes other
//! upgradeable and write scopes; a write scope excludes everything else.
//! Only an upgradeable-read scope can become a write scope, in place.

pub mod event;
pub mod handle;
pub mod manager;
pub mod types;

pub use event::{LockEvent, LockEventKind};
pub use handle::{ReadLockHandle, UpgradeableReadLockHandle, WriteLockHandle};
pub use manager::LockManager;
pub use types::{LockKind, LockMetrics, MetricsSnapshot, ScopeId};

//! Lock manager for the shared project collection
//!
//! The manager owns the reader/writer lock around the collection. Waiter
//! queueing, fairness, and the upgradable state machine belong to the lock
//! primitive (`async-lock`); the manager layers scope ids, cancellation-
//! and timeout-aware waiting, metrics, and lifecycle events on top, and
//! hands out the typed scoped handles from [`super::handle`].

use crate::config::CoordinatorConfig;
use crate::error::Result;
use crate::evaluate::ProjectEvaluator;
use crate::locking::event::LockEvent;
use crate::locking::handle::{
    ManagerShared, ReadLockHandle, ScopeTicket, UpgradeableReadLockHandle, WriteLockHandle,
};
use crate::locking::types::{LockKind, LockMetrics, MetricsSnapshot, ScopeId};
use crate::model::ProjectCollection;
use crate::store::DocumentStore;
use async_lock::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Coordinates scoped lock acquisition over one project collection
pub struct LockManager {
    lock: Arc<RwLock<ProjectCollection>>,
    shared: Arc<ManagerShared>,
    next_scope: AtomicU64,
}

impl LockManager {
    pub(crate) fn new(
        config: &CoordinatorConfig,
        store: Arc<dyn DocumentStore>,
        evaluator: Arc<dyn ProjectEvaluator>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            lock: Arc::new(RwLock::new(ProjectCollection::new(store, evaluator))),
            shared: Arc::new(ManagerShared {
                metrics: LockMetrics::new(),
                events,
                acquire_timeout: config.acquire_timeout,
            }),
            next_scope: AtomicU64::new(0),
        }
    }

    /// Snapshot of the lock metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Subscribe to lock lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.shared.events.subscribe()
    }

    fn begin_scope(&self, kind: LockKind) -> ScopeId {
        let scope = self.next_scope.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared.metrics.record_request(kind);
        debug!(scope, kind = %kind, "waiting for lock");
        scope
    }

    /// Acquire a read lock, suspending until one is available
    pub(crate) async fn acquire_read(&self, cancel: &CancellationToken) -> Result<ReadLockHandle> {
        let scope = self.begin_scope(LockKind::Read);
        let guard = self
            .shared
            .wait_for(LockKind::Read, scope, cancel, self.lock.read_arc())
            .await?;
        self.shared.emit(LockEvent::acquired(scope, LockKind::Read));
        Ok(ReadLockHandle::new(
            guard,
            ScopeTicket::new(Arc::clone(&self.shared), scope, LockKind::Read),
        ))
    }

    /// Acquire an upgradeable read lock, suspending until compatible
    pub(crate) async fn acquire_upgradeable_read(
        &self,
        cancel: &CancellationToken,
    ) -> Result<UpgradeableReadLockHandle> {
        let scope = self.begin_scope(LockKind::UpgradeableRead);
        let guard = self
            .shared
            .wait_for(
                LockKind::UpgradeableRead,
                scope,
                cancel,
                self.lock.upgradable_read_arc(),
            )
            .await?;
        self.shared
            .emit(LockEvent::acquired(scope, LockKind::UpgradeableRead));
        Ok(UpgradeableReadLockHandle::new(
            guard,
            ScopeTicket::new(Arc::clone(&self.shared), scope, LockKind::UpgradeableRead),
        ))
    }

    /// Acquire the write lock, suspending until exclusive
    pub(crate) async fn acquire_write(&self, cancel: &CancellationToken) -> Result<WriteLockHandle> {
        let scope = self.begin_scope(LockKind::Write);
        let guard = self
            .shared
            .wait_for(LockKind::Write, scope, cancel, self.lock.write_arc())
            .await?;
        self.shared.emit(LockEvent::acquired(scope, LockKind::Write));
        Ok(WriteLockHandle::new(
            guard,
            ScopeTicket::new(Arc::clone(&self.shared), scope, LockKind::Write),
        ))
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("scopes_issued", &self.next_scope.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentTree;
    use crate::error::Error;
    use crate::evaluate::StandardEvaluator;
    use crate::model::{ProjectPath, UnconfiguredProject};
    use crate::store::MemoryDocumentStore;
    use std::time::Duration;

    fn manager_with(config: CoordinatorConfig) -> (LockManager, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert(DocumentTree::empty(ProjectPath::new("app/app.proj")));
        let manager = LockManager::new(&config, store.clone(), Arc::new(StandardEvaluator::new()));
        (manager, store)
    }

    fn manager() -> (LockManager, Arc<MemoryDocumentStore>) {
        manager_with(CoordinatorConfig::default())
    }

    #[tokio::test]
    async fn test_concurrent_readers_share_the_lock() {
        let (manager, _store) = manager();
        let cancel = CancellationToken::new();

        let first = manager.acquire_read(&cancel).await.unwrap();
        let second = manager.acquire_read(&cancel).await.unwrap();
        assert_ne!(first.scope(), second.scope());

        first.release().await;
        second.release().await;

        let snapshot = manager.metrics();
        assert_eq!(snapshot.read_requests, 2);
        assert_eq!(snapshot.acquisitions, 2);
        assert_eq!(snapshot.releases, 2);
    }

    #[tokio::test]
    async fn test_writer_excluded_while_reader_holds() {
        let (manager, _store) =
            manager_with(CoordinatorConfig::default().with_acquire_timeout(Duration::from_millis(50)));
        let cancel = CancellationToken::new();

        let read = manager.acquire_read(&cancel).await.unwrap();
        let err = manager.acquire_write(&cancel).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        read.release().await;
        let write = manager.acquire_write(&cancel).await.unwrap();
        write.release().await;

        assert_eq!(manager.metrics().timeouts, 1);
    }

    #[tokio::test]
    async fn test_cancelled_wait_acquires_nothing() {
        let (manager, _store) = manager();
        let cancel = CancellationToken::new();

        let write = manager.acquire_write(&cancel).await.unwrap();

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let err = manager.acquire_read(&cancelled).await.unwrap_err();
        assert!(err.is_cancelled());

        write.release().await;

        // The lock is free: the cancelled wait did not leak anything
        let read = manager.acquire_read(&cancel).await.unwrap();
        read.release().await;

        let snapshot = manager.metrics();
        assert_eq!(snapshot.cancelled_waits, 1);
        assert_eq!(snapshot.acquisitions, 2);
        assert_eq!(snapshot.releases, 2);
    }

    #[tokio::test]
    async fn test_upgradeable_excludes_upgradeable_but_not_readers() {
        let (manager, _store) =
            manager_with(CoordinatorConfig::default().with_acquire_timeout(Duration::from_millis(50)));
        let cancel = CancellationToken::new();

        let upgradeable = manager.acquire_upgradeable_read(&cancel).await.unwrap();

        // A plain read is admitted alongside the upgradeable scope
        let read = manager.acquire_read(&cancel).await.unwrap();
        read.release().await;

        // A second upgradeable scope is not
        let err = manager.acquire_upgradeable_read(&cancel).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        upgradeable.release().await;
    }

    #[tokio::test]
    async fn test_upgrade_keeps_scope_and_allows_editing() {
        let (manager, store) = manager();
        let cancel = CancellationToken::new();
        let project = UnconfiguredProject::new("app/app.proj");

        let upgradeable = manager.acquire_upgradeable_read(&cancel).await.unwrap();
        let scope = upgradeable.scope();

        let mut write = upgradeable.upgrade(&cancel).await.unwrap();
        assert_eq!(write.scope(), scope);

        write.checkout(&project).await.unwrap();
        write
            .edit_document(&project, &cancel, |tree| {
                tree.set_property("Optimize", "true");
            })
            .await
            .unwrap();
        write.release().await;

        assert_eq!(store.checkout_count(project.path()), 1);
        let snapshot = manager.metrics();
        assert_eq!(snapshot.upgrades, 1);
        assert_eq!(snapshot.checkouts, 1);
        // One acquisition for the upgradeable grant, one for the upgrade,
        // but only a single scope was released
        assert_eq!(snapshot.releases, 1);
    }

    #[tokio::test]
    async fn test_edit_without_checkout_is_rejected() {
        let (manager, _store) = manager();
        let cancel = CancellationToken::new();
        let project = UnconfiguredProject::new("app/app.proj");

        let mut write = manager.acquire_write(&cancel).await.unwrap();
        let err = write
            .edit_document(&project, &cancel, |tree| {
                tree.set_property("Optimize", "true");
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotCheckedOut { .. }));
        write.release().await;
    }

    #[tokio::test]
    async fn test_checkout_is_idempotent_within_a_scope() {
        let (manager, store) = manager();
        let cancel = CancellationToken::new();
        let project = UnconfiguredProject::new("app/app.proj");

        let mut write = manager.acquire_write(&cancel).await.unwrap();
        write.checkout(&project).await.unwrap();
        write.checkout(&project).await.unwrap();
        assert!(write.is_checked_out(&project));
        write.release().await;

        assert_eq!(store.checkout_count(project.path()), 1);
        assert_eq!(manager.metrics().checkouts, 1);
    }
}

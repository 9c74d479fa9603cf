//! Scoped lock handles
//!
//! A handle proves its lock is held. Each handle owns an `Arc`-owned guard
//! from the underlying rwlock plus a [`ScopeTicket`] whose `Drop` performs
//! the release bookkeeping on every exit path, panics included. The
//! explicit [`release`](ReadLockHandle::release) call is the normal path;
//! dropping a handle without it still releases the lock.
//!
//! Write handles carry the scope-local set of checked-out documents and
//! refuse to edit anything outside it. Upgradeable handles are the only
//! scope kind that can transition to write, in place, via
//! [`UpgradeableReadLockHandle::upgrade`].

use crate::document::DocumentTree;
use crate::error::{Error, Result};
use crate::locking::event::LockEvent;
use crate::locking::types::{LockKind, LockMetrics, ScopeId};
use crate::model::{
    ConfiguredProject, EvaluatedProject, ProjectCollection, ProjectPath, UnconfiguredProject,
};
use async_lock::{RwLockReadGuardArc, RwLockUpgradableReadGuardArc, RwLockWriteGuardArc};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// State shared between the manager and the handles it issues
pub(crate) struct ManagerShared {
    pub(crate) metrics: LockMetrics,
    pub(crate) events: broadcast::Sender<LockEvent>,
    pub(crate) acquire_timeout: Option<Duration>,
}

impl ManagerShared {
    /// Publish an event; having no subscribers is not an error
    pub(crate) fn emit(&self, event: LockEvent) {
        let _ = self.events.send(event);
    }

    /// Wait for `acquire`, aborting on cancellation or the configured
    /// acquire timeout. Cancellation is checked first, so a token cancelled
    /// before the wait starts acquires nothing.
    pub(crate) async fn wait_for<G>(
        &self,
        kind: LockKind,
        scope: ScopeId,
        cancel: &CancellationToken,
        acquire: impl Future<Output = G>,
    ) -> Result<G> {
        let start = Instant::now();
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.metrics.record_cancelled_wait();
                self.emit(LockEvent::wait_cancelled(scope, kind));
                debug!(scope, kind = %kind, "lock wait cancelled");
                Err(Error::Cancelled { kind })
            }
            outcome = async {
                match self.acquire_timeout {
                    Some(limit) => tokio::time::timeout(limit, acquire).await.ok(),
                    None => Some(acquire.await),
                }
            } => match outcome {
                Some(guard) => {
                    self.metrics.record_acquisition();
                    debug!(
                        scope,
                        kind = %kind,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "lock acquired"
                    );
                    Ok(guard)
                }
                None => {
                    let waited_ms = start.elapsed().as_millis() as u64;
                    self.metrics.record_timeout();
                    self.emit(LockEvent::wait_timed_out(scope, kind));
                    warn!(scope, kind = %kind, waited_ms, "lock wait timed out");
                    Err(Error::Timeout { kind, waited_ms })
                }
            }
        }
    }

    fn note_released(&self, scope: ScopeId, kind: LockKind, explicit: bool) {
        self.metrics.record_release();
        self.emit(LockEvent::released(scope, explicit));
        debug!(scope, kind = %kind, explicit, "lock released");
    }
}

/// Release bookkeeping that runs on every exit path of a lock scope
pub(crate) struct ScopeTicket {
    shared: Arc<ManagerShared>,
    scope: ScopeId,
    kind: LockKind,
    explicit: bool,
}

impl ScopeTicket {
    pub(crate) fn new(shared: Arc<ManagerShared>, scope: ScopeId, kind: LockKind) -> Self {
        Self {
            shared,
            scope,
            kind,
            explicit: false,
        }
    }

    pub(crate) fn scope(&self) -> ScopeId {
        self.scope
    }

    pub(crate) fn shared(&self) -> &Arc<ManagerShared> {
        &self.shared
    }

    fn mark_explicit(&mut self) {
        self.explicit = true;
    }

    fn promote(&mut self, kind: LockKind) {
        self.kind = kind;
    }
}

impl Drop for ScopeTicket {
    fn drop(&mut self) {
        self.shared.note_released(self.scope, self.kind, self.explicit);
    }
}

/// A held read lock over the project collection
pub struct ReadLockHandle {
    guard: RwLockReadGuardArc<ProjectCollection>,
    ticket: ScopeTicket,
}

impl ReadLockHandle {
    pub(crate) fn new(guard: RwLockReadGuardArc<ProjectCollection>, ticket: ScopeTicket) -> Self {
        Self { guard, ticket }
    }

    /// The scope id of this lock
    pub fn scope(&self) -> ScopeId {
        self.ticket.scope()
    }

    /// The locked collection
    pub fn collection(&self) -> &ProjectCollection {
        &self.guard
    }

    /// Resolve the document tree for `project`
    pub async fn document_tree(
        &self,
        project: &UnconfiguredProject,
        cancel: &CancellationToken,
    ) -> Result<Arc<DocumentTree>> {
        self.guard.resolve_document(project.path(), cancel).await
    }

    /// Resolve the evaluated view for `project`
    pub async fn evaluated_project(
        &self,
        project: &ConfiguredProject,
        cancel: &CancellationToken,
    ) -> Result<Arc<EvaluatedProject>> {
        self.guard.resolve_evaluated(project, cancel).await
    }

    /// Explicitly release the lock (the drop backstop covers other paths)
    pub async fn release(mut self) {
        self.ticket.mark_explicit();
    }
}

impl fmt::Debug for ReadLockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadLockHandle")
            .field("scope", &self.ticket.scope())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ReadLockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadLock[scope {}]", self.ticket.scope())
    }
}

/// A held upgradeable-read lock: shared read access plus the exclusive
/// right to upgrade to a write lock
pub struct UpgradeableReadLockHandle {
    guard: RwLockUpgradableReadGuardArc<ProjectCollection>,
    ticket: ScopeTicket,
}

impl UpgradeableReadLockHandle {
    pub(crate) fn new(
        guard: RwLockUpgradableReadGuardArc<ProjectCollection>,
        ticket: ScopeTicket,
    ) -> Self {
        Self { guard, ticket }
    }

    /// The scope id of this lock
    pub fn scope(&self) -> ScopeId {
        self.ticket.scope()
    }

    /// The locked collection
    pub fn collection(&self) -> &ProjectCollection {
        &self.guard
    }

    /// Resolve the document tree for `project`
    pub async fn document_tree(
        &self,
        project: &UnconfiguredProject,
        cancel: &CancellationToken,
    ) -> Result<Arc<DocumentTree>> {
        self.guard.resolve_document(project.path(), cancel).await
    }

    /// Resolve the evaluated view for `project`
    pub async fn evaluated_project(
        &self,
        project: &ConfiguredProject,
        cancel: &CancellationToken,
    ) -> Result<Arc<EvaluatedProject>> {
        self.guard.resolve_evaluated(project, cancel).await
    }

    /// Upgrade to a write lock in place, keeping the same scope.
    ///
    /// Waits for current readers to finish. Cancellation while waiting
    /// aborts the whole scope: the lock is released and the handle is gone.
    pub async fn upgrade(self, cancel: &CancellationToken) -> Result<WriteLockHandle> {
        let Self { guard, mut ticket } = self;
        let shared = Arc::clone(ticket.shared());
        let scope = ticket.scope();

        debug!(scope, "upgrading to write lock");
        let upgrade = RwLockUpgradableReadGuardArc::upgrade(guard);
        let write_guard = shared
            .wait_for(LockKind::Write, scope, cancel, upgrade)
            .await?;

        ticket.promote(LockKind::Write);
        shared.metrics.record_upgrade();
        shared.emit(LockEvent::upgraded(scope));
        info!(scope, "upgradeable read upgraded to write");

        Ok(WriteLockHandle {
            guard: write_guard,
            ticket,
            checked_out: HashSet::new(),
        })
    }

    /// Explicitly release the lock
    pub async fn release(mut self) {
        self.ticket.mark_explicit();
    }
}

impl fmt::Debug for UpgradeableReadLockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeableReadLockHandle")
            .field("scope", &self.ticket.scope())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for UpgradeableReadLockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpgradeableReadLock[scope {}]", self.ticket.scope())
    }
}

/// A held write lock: exclusive access to the collection, with the
/// scope-local record of checked-out documents
pub struct WriteLockHandle {
    guard: RwLockWriteGuardArc<ProjectCollection>,
    ticket: ScopeTicket,
    checked_out: HashSet<ProjectPath>,
}

impl WriteLockHandle {
    pub(crate) fn new(guard: RwLockWriteGuardArc<ProjectCollection>, ticket: ScopeTicket) -> Self {
        Self {
            guard,
            ticket,
            checked_out: HashSet::new(),
        }
    }

    /// The scope id of this lock
    pub fn scope(&self) -> ScopeId {
        self.ticket.scope()
    }

    /// The locked collection
    pub fn collection(&self) -> &ProjectCollection {
        &self.guard
    }

    /// Whether `project`'s document is checked out in this scope
    pub fn is_checked_out(&self, project: &UnconfiguredProject) -> bool {
        self.checked_out.contains(project.path())
    }

    /// Check out `project`'s document for writing. Idempotent within this
    /// scope: the second checkout of the same document is a no-op.
    pub async fn checkout(&mut self, project: &UnconfiguredProject) -> Result<()> {
        let path = project.path();
        if self.checked_out.contains(path) {
            debug!(scope = self.ticket.scope(), path = %path, "document already checked out in this scope");
            return Ok(());
        }

        let store = Arc::clone(self.guard.store());
        store.checkout(path).await.map_err(|source| Error::Checkout {
            path: path.to_string(),
            source,
        })?;

        self.guard.mark_checked_out(path);
        self.checked_out.insert(path.clone());
        self.ticket.shared().metrics.record_checkout();
        self.ticket
            .shared()
            .emit(LockEvent::checked_out(self.ticket.scope(), path));
        info!(scope = self.ticket.scope(), path = %path, "document checked out for write");
        Ok(())
    }

    /// Resolve the document tree for `project`
    pub async fn document_tree(
        &self,
        project: &UnconfiguredProject,
        cancel: &CancellationToken,
    ) -> Result<Arc<DocumentTree>> {
        self.guard.resolve_document(project.path(), cancel).await
    }

    /// Resolve the evaluated view for `project`
    pub async fn evaluated_project(
        &self,
        project: &ConfiguredProject,
        cancel: &CancellationToken,
    ) -> Result<Arc<EvaluatedProject>> {
        self.guard.resolve_evaluated(project, cancel).await
    }

    /// Apply a mutation to `project`'s document tree.
    ///
    /// The document must have been checked out in this scope.
    pub async fn edit_document<T>(
        &mut self,
        project: &UnconfiguredProject,
        cancel: &CancellationToken,
        mutate_fn: impl FnOnce(&mut DocumentTree) -> T,
    ) -> Result<T> {
        let path = project.path();
        if !self.checked_out.contains(path) {
            return Err(Error::NotCheckedOut {
                path: path.to_string(),
            });
        }
        self.guard.edit_document(path, cancel, mutate_fn).await
    }

    /// Apply a mutation to `project`'s evaluated view.
    ///
    /// The backing document must have been checked out in this scope.
    pub async fn edit_project<T>(
        &mut self,
        project: &ConfiguredProject,
        cancel: &CancellationToken,
        mutate_fn: impl FnOnce(&mut EvaluatedProject) -> T,
    ) -> Result<T> {
        if !self.checked_out.contains(project.path()) {
            return Err(Error::NotCheckedOut {
                path: project.path().to_string(),
            });
        }
        self.guard.edit_evaluated(project, cancel, mutate_fn).await
    }

    /// Drop all cached state for `project`; returns whether anything was loaded
    pub fn unload(&mut self, project: &UnconfiguredProject) -> bool {
        self.guard.unload(project.path())
    }

    /// Explicitly release the lock
    pub async fn release(mut self) {
        self.ticket.mark_explicit();
    }
}

impl fmt::Debug for WriteLockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteLockHandle")
            .field("scope", &self.ticket.scope())
            .field("checked_out", &self.checked_out.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for WriteLockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriteLock[scope {}]", self.ticket.scope())
    }
}

//! The access coordinator
//!
//! [`ProjectCoordinator`] is the single entry point for working with the
//! shared project model. Every operation follows the same sequence:
//! validate arguments, acquire the lock, (check out if writing), resolve
//! the requested view, invoke the caller's logic, then explicitly release.
//! The locked section runs in a task spawned on the worker pool, so work
//! under a lock never resumes on the caller's thread.
//!
//! Read projections and write mutations are plain `FnOnce` closures: they
//! structurally cannot suspend, which bounds how long a read lock can stall
//! a waiting writer. Only the collection-level write body and the
//! upgradeable-read body are async, because their purpose is to sequence
//! further locked calls (checkout, edit, upgrade).
//!
//! Do not issue a fresh coordinator operation from inside a held scope's
//! async body: a write scope waiting on another write scope of the same
//! coordinator deadlocks. Use the handle (or [`DocumentEditScope::write`])
//! passed to the body instead.
//!
//! # Example
//!
//! ```ignore
//! use projlock_core::prelude::*;
//! use std::sync::Arc;
//!
//! let coordinator = ProjectCoordinator::new(store, Arc::new(StandardEvaluator::new()));
//! let project = UnconfiguredProject::new("app/app.proj");
//!
//! // Read the document under a shared lock
//! let output = coordinator
//!     .read_document(&project, CancellationToken::new(), |tree| {
//!         tree.property("OutputType").map(str::to_owned)
//!     })
//!     .await?;
//!
//! // Mutate it under the exclusive lock (checked out automatically)
//! coordinator
//!     .write_document(&project, CancellationToken::new(), |tree| {
//!         tree.set_property("OutputType", "Exe");
//!     })
//!     .await?;
//! ```

use crate::config::CoordinatorConfig;
use crate::document::DocumentTree;
use crate::error::{Error, Result};
use crate::evaluate::ProjectEvaluator;
use crate::locking::event::LockEvent;
use crate::locking::handle::{UpgradeableReadLockHandle, WriteLockHandle};
use crate::locking::manager::LockManager;
use crate::locking::types::MetricsSnapshot;
use crate::model::{ConfiguredProject, EvaluatedProject, UnconfiguredProject};
use crate::store::DocumentStore;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Coordinates scoped, lock-protected access to the shared project model
#[derive(Clone)]
pub struct ProjectCoordinator {
    manager: Arc<LockManager>,
}

impl ProjectCoordinator {
    /// Create a coordinator with default configuration
    pub fn new(store: Arc<dyn DocumentStore>, evaluator: Arc<dyn ProjectEvaluator>) -> Self {
        Self::with_config(CoordinatorConfig::default(), store, evaluator)
    }

    /// Create a coordinator with the given configuration
    pub fn with_config(
        config: CoordinatorConfig,
        store: Arc<dyn DocumentStore>,
        evaluator: Arc<dyn ProjectEvaluator>,
    ) -> Self {
        Self {
            manager: Arc::new(LockManager::new(&config, store, evaluator)),
        }
    }

    /// Snapshot of the lock metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.manager.metrics()
    }

    /// Subscribe to lock lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.manager.subscribe()
    }

    /// Run an async body under the collection-level write lock.
    ///
    /// The body receives the write handle and can sequence further locked
    /// steps through it: checkout, document/project edits, unloading.
    /// The lock is explicitly released before this returns, whether the
    /// body succeeded or failed.
    pub async fn write_lock<T, F>(&self, cancel: CancellationToken, body: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut WriteLockHandle, CancellationToken) -> BoxFuture<'a, Result<T>>
            + Send
            + 'static,
    {
        let manager = Arc::clone(&self.manager);
        dispatch(async move {
            let mut handle = manager.acquire_write(&cancel).await?;
            let outcome = body(&mut handle, cancel.clone()).await;
            handle.release().await;
            outcome
        })
        .await
    }

    /// Resolve the evaluated view for `project` under a read lock and apply
    /// a synchronous projection to it.
    pub async fn read_project<T, F>(
        &self,
        project: &ConfiguredProject,
        cancel: CancellationToken,
        project_fn: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&EvaluatedProject) -> T + Send + 'static,
    {
        require_configured(project)?;
        let manager = Arc::clone(&self.manager);
        let project = project.clone();
        dispatch(async move {
            let handle = manager.acquire_read(&cancel).await?;
            let outcome = match handle.evaluated_project(&project, &cancel).await {
                Ok(view) => Ok(project_fn(&view)),
                Err(err) => Err(err),
            };
            handle.release().await;
            outcome
        })
        .await
    }

    /// Resolve the document tree for `project` under a read lock and apply
    /// a synchronous projection to it.
    pub async fn read_document<T, F>(
        &self,
        project: &UnconfiguredProject,
        cancel: CancellationToken,
        document_fn: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DocumentTree) -> T + Send + 'static,
    {
        require_project(project)?;
        let manager = Arc::clone(&self.manager);
        let project = project.clone();
        dispatch(async move {
            let handle = manager.acquire_read(&cancel).await?;
            let outcome = match handle.document_tree(&project, &cancel).await {
                Ok(document) => Ok(document_fn(&document)),
                Err(err) => Err(err),
            };
            handle.release().await;
            outcome
        })
        .await
    }

    /// Resolve the document tree for `project` under an upgradeable read
    /// lock and run an async body against it.
    ///
    /// The body's [`DocumentEditScope`] can read the document and, when it
    /// decides to edit, call [`DocumentEditScope::write`] to upgrade to the
    /// write lock in place — same scope, same document identity.
    pub async fn upgradeable_read_document<T, F>(
        &self,
        project: &UnconfiguredProject,
        cancel: CancellationToken,
        body: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut DocumentEditScope, CancellationToken) -> BoxFuture<'a, Result<T>>
            + Send
            + 'static,
    {
        require_project(project)?;
        let manager = Arc::clone(&self.manager);
        let project = project.clone();
        dispatch(async move {
            let handle = manager.acquire_upgradeable_read(&cancel).await?;
            let document = match handle.document_tree(&project, &cancel).await {
                Ok(document) => document,
                Err(err) => {
                    handle.release().await;
                    return Err(err);
                }
            };
            let mut scope = DocumentEditScope::new(handle, project, document);
            let outcome = body(&mut scope, cancel.clone()).await;
            scope.release().await;
            outcome
        })
        .await
    }

    /// Apply a synchronous mutation to `project`'s document tree under the
    /// write lock. The document is checked out before it is resolved, so
    /// the mutated tree reflects its pending-write state.
    pub async fn write_document<T, F>(
        &self,
        project: &UnconfiguredProject,
        cancel: CancellationToken,
        mutate_fn: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DocumentTree) -> T + Send + 'static,
    {
        require_project(project)?;
        let manager = Arc::clone(&self.manager);
        let project = project.clone();
        dispatch(async move {
            let mut handle = manager.acquire_write(&cancel).await?;
            let outcome = match handle.checkout(&project).await {
                Ok(()) => handle.edit_document(&project, &cancel, mutate_fn).await,
                Err(err) => Err(err),
            };
            handle.release().await;
            outcome
        })
        .await
    }

    /// Apply a synchronous mutation to `project`'s evaluated view under the
    /// write lock, checking out the owning document first.
    pub async fn write_project<T, F>(
        &self,
        project: &ConfiguredProject,
        cancel: CancellationToken,
        mutate_fn: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut EvaluatedProject) -> T + Send + 'static,
    {
        require_configured(project)?;
        let manager = Arc::clone(&self.manager);
        let project = project.clone();
        dispatch(async move {
            let mut handle = manager.acquire_write(&cancel).await?;
            let outcome = match handle.checkout(project.unconfigured()).await {
                Ok(()) => handle.edit_project(&project, &cancel, mutate_fn).await,
                Err(err) => Err(err),
            };
            handle.release().await;
            outcome
        })
        .await
    }
}

impl fmt::Debug for ProjectCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectCoordinator")
            .field("manager", &self.manager)
            .finish()
    }
}

/// The scope handed to an upgradeable-read body
///
/// Starts as an upgradeable read over one document. The first
/// [`write`](Self::write) call upgrades the lock in place; the scope stays
/// in the write state for the rest of the body, so later `write` calls
/// reuse the held write lock and the already-checked-out document.
pub struct DocumentEditScope {
    state: EditScopeState,
    project: UnconfiguredProject,
    document: Arc<DocumentTree>,
}

enum EditScopeState {
    Upgradeable(UpgradeableReadLockHandle),
    Write(WriteLockHandle),
    Released,
}

impl DocumentEditScope {
    fn new(
        handle: UpgradeableReadLockHandle,
        project: UnconfiguredProject,
        document: Arc<DocumentTree>,
    ) -> Self {
        Self {
            state: EditScopeState::Upgradeable(handle),
            project,
            document,
        }
    }

    /// The project whose document this scope holds
    pub fn project(&self) -> &UnconfiguredProject {
        &self.project
    }

    /// The current document snapshot (refreshed after each `write`)
    pub fn document(&self) -> &DocumentTree {
        &self.document
    }

    /// Whether this scope has upgraded to the write lock
    pub fn has_upgraded(&self) -> bool {
        matches!(self.state, EditScopeState::Write(_))
    }

    /// Upgrade to the write lock (if not already upgraded), check the
    /// document out, and apply a synchronous mutation to it.
    ///
    /// Cancellation while waiting for the upgrade aborts the whole scope;
    /// the lock is released and later `write` calls fail.
    pub async fn write<T>(
        &mut self,
        cancel: &CancellationToken,
        mutate_fn: impl FnOnce(&mut DocumentTree) -> T,
    ) -> Result<T> {
        let state = std::mem::replace(&mut self.state, EditScopeState::Released);
        let mut handle = match state {
            EditScopeState::Upgradeable(handle) => handle.upgrade(cancel).await?,
            EditScopeState::Write(handle) => handle,
            EditScopeState::Released => {
                return Err(Error::ScopeReleased(
                    "document scope was lost to a cancelled upgrade".to_string(),
                ))
            }
        };

        let project = &self.project;
        let outcome = async {
            handle.checkout(project).await?;
            let output = handle.edit_document(project, cancel, mutate_fn).await?;
            let document = handle.document_tree(project, cancel).await?;
            Ok((output, document))
        }
        .await;

        self.state = EditScopeState::Write(handle);
        let (output, document) = outcome?;
        self.document = document;
        Ok(output)
    }

    pub(crate) async fn release(self) {
        match self.state {
            EditScopeState::Upgradeable(handle) => handle.release().await,
            EditScopeState::Write(handle) => handle.release().await,
            EditScopeState::Released => {}
        }
    }
}

impl fmt::Debug for DocumentEditScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentEditScope")
            .field("project", &self.project)
            .field("upgraded", &self.has_upgraded())
            .finish_non_exhaustive()
    }
}

/// Run the locked section on the worker pool, resuming body panics on the
/// caller after the lock guard has already released.
async fn dispatch<T>(locked: impl Future<Output = Result<T>> + Send + 'static) -> Result<T>
where
    T: Send + 'static,
{
    match tokio::spawn(locked).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(Error::Dispatch(err.to_string())),
    }
}

fn require_project(project: &UnconfiguredProject) -> Result<()> {
    if project.path().is_empty() {
        return Err(Error::precondition("project path is empty"));
    }
    Ok(())
}

fn require_configured(project: &ConfiguredProject) -> Result<()> {
    require_project(project.unconfigured())?;
    if project.configuration().name().is_empty() {
        return Err(Error::precondition("configuration name is empty"));
    }
    Ok(())
}

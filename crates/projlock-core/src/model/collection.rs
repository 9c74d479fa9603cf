//! Root container of loaded project state
//!
//! A [`ProjectCollection`] is only reachable through a held lock: read
//! scopes see `&ProjectCollection`, write scopes see `&mut
//! ProjectCollection` through their handle. Documents and evaluated views
//! are cached per project; cache fills under a read lock serialize on an
//! internal mutex, while edits under a write lock go through `&mut self`
//! and copy-on-write, so a snapshot retained past its scope is a frozen
//! copy rather than a view of later edits.

use crate::document::DocumentTree;
use crate::error::{Error, Result};
use crate::evaluate::ProjectEvaluator;
use crate::model::{ConfiguredProject, EvaluatedProject, ProjectPath};
use crate::store::DocumentStore;
use async_lock::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-project cached state
struct ProjectSlot {
    document: Option<Arc<DocumentTree>>,
    evaluated: HashMap<String, Arc<EvaluatedProject>>,
    checked_out: bool,
}

impl ProjectSlot {
    fn new() -> Self {
        Self {
            document: None,
            evaluated: HashMap::new(),
            checked_out: false,
        }
    }
}

/// Root container of all loaded projects' evaluated state
pub struct ProjectCollection {
    store: Arc<dyn DocumentStore>,
    evaluator: Arc<dyn ProjectEvaluator>,
    slots: Mutex<HashMap<ProjectPath, ProjectSlot>>,
}

impl ProjectCollection {
    pub(crate) fn new(store: Arc<dyn DocumentStore>, evaluator: Arc<dyn ProjectEvaluator>) -> Self {
        Self {
            store,
            evaluator,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Paths of all projects with loaded state
    pub async fn loaded_paths(&self) -> Vec<ProjectPath> {
        let slots = self.slots.lock().await;
        slots.keys().cloned().collect()
    }

    /// Whether any state is loaded for the given path
    pub async fn is_loaded(&self, path: &ProjectPath) -> bool {
        let slots = self.slots.lock().await;
        slots.contains_key(path)
    }

    /// Resolve the document tree for `path`, loading it on first access.
    ///
    /// The registry mutex is held across the load so each document is
    /// parsed at most once per collection.
    pub(crate) async fn resolve_document(
        &self,
        path: &ProjectPath,
        cancel: &CancellationToken,
    ) -> Result<Arc<DocumentTree>> {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(path.clone()).or_insert_with(ProjectSlot::new);

        if let Some(document) = &slot.document {
            return Ok(Arc::clone(document));
        }

        debug!(path = %path, "loading document");
        let mut tree = self
            .store
            .load(path, cancel)
            .await
            .map_err(|source| Error::DocumentLoad {
                path: path.to_string(),
                source,
            })?;
        if slot.checked_out {
            tree.mark_pending_write();
        }

        let document = Arc::new(tree);
        slot.document = Some(Arc::clone(&document));
        Ok(document)
    }

    /// Resolve the evaluated view for `project`, re-evaluating when the
    /// cached view is missing or stale against the document version.
    pub(crate) async fn resolve_evaluated(
        &self,
        project: &ConfiguredProject,
        cancel: &CancellationToken,
    ) -> Result<Arc<EvaluatedProject>> {
        let document = self.resolve_document(project.path(), cancel).await?;
        let key = project.configuration().key();

        let mut slots = self.slots.lock().await;
        let slot = slots
            .entry(project.path().clone())
            .or_insert_with(ProjectSlot::new);

        if let Some(view) = slot.evaluated.get(&key) {
            if view.document_version() == document.version() {
                return Ok(Arc::clone(view));
            }
        }

        debug!(path = %project.path(), configuration = %key, version = document.version(), "evaluating project");
        let view = self
            .evaluator
            .evaluate(&document, project, cancel)
            .await
            .map_err(|source| Error::Evaluation {
                path: project.path().to_string(),
                configuration: key.clone(),
                source,
            })?;

        let view = Arc::new(view);
        slot.evaluated.insert(key, Arc::clone(&view));
        Ok(view)
    }

    /// Record that `path` is checked out, marking a loaded document as
    /// pending-write. The store-side checkout is the write handle's job.
    pub(crate) fn mark_checked_out(&mut self, path: &ProjectPath) {
        let slots = self.slots.get_mut();
        let slot = slots.entry(path.clone()).or_insert_with(ProjectSlot::new);
        slot.checked_out = true;
        if let Some(document) = &mut slot.document {
            Arc::make_mut(document).mark_pending_write();
        }
    }

    /// Apply a mutation to the document tree for `path`, bumping its
    /// version. Loads the document first if needed.
    pub(crate) async fn edit_document<T>(
        &mut self,
        path: &ProjectPath,
        cancel: &CancellationToken,
        mutate_fn: impl FnOnce(&mut DocumentTree) -> T,
    ) -> Result<T> {
        self.resolve_document(path, cancel).await?;

        let slots = self.slots.get_mut();
        let document = slots
            .get_mut(path)
            .and_then(|slot| slot.document.as_mut())
            .ok_or_else(|| Error::Other(format!("no document state for '{path}'")))?;

        let tree = Arc::make_mut(document);
        let output = mutate_fn(tree);
        tree.bump_version();
        debug!(path = %path, version = tree.version(), "document edited");
        Ok(output)
    }

    /// Apply a mutation to the evaluated view for `project`, refreshing the
    /// view first if stale. The mutated view stays cached until the backing
    /// document's version changes.
    pub(crate) async fn edit_evaluated<T>(
        &mut self,
        project: &ConfiguredProject,
        cancel: &CancellationToken,
        mutate_fn: impl FnOnce(&mut EvaluatedProject) -> T,
    ) -> Result<T> {
        self.resolve_evaluated(project, cancel).await?;
        let key = project.configuration().key();

        let slots = self.slots.get_mut();
        let view = slots
            .get_mut(project.path())
            .and_then(|slot| slot.evaluated.get_mut(&key))
            .ok_or_else(|| {
                Error::Other(format!("no evaluated state for '{}'", project.path()))
            })?;

        Ok(mutate_fn(Arc::make_mut(view)))
    }

    /// Drop all cached state for `path`; returns whether anything was loaded
    pub(crate) fn unload(&mut self, path: &ProjectPath) -> bool {
        self.slots.get_mut().remove(path).is_some()
    }
}

impl fmt::Debug for ProjectCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectCollection").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentTree;
    use crate::evaluate::StandardEvaluator;
    use crate::model::{ProjectConfiguration, UnconfiguredProject};
    use crate::store::MemoryDocumentStore;

    fn collection_with(path: &str) -> (ProjectCollection, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut tree = DocumentTree::empty(ProjectPath::new(path));
        tree.set_property("OutputType", "Library");
        store.insert(tree);

        let collection =
            ProjectCollection::new(store.clone(), Arc::new(StandardEvaluator::new()));
        (collection, store)
    }

    #[tokio::test]
    async fn test_resolve_document_loads_once() {
        let (collection, store) = collection_with("app/app.proj");
        let path = ProjectPath::new("app/app.proj");
        let cancel = CancellationToken::new();

        let first = collection.resolve_document(&path, &cancel).await.unwrap();
        let second = collection.resolve_document(&path, &cancel).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.load_count(&path), 1);
        assert!(collection.is_loaded(&path).await);
    }

    #[tokio::test]
    async fn test_resolve_evaluated_caches_per_configuration() {
        let (collection, _store) = collection_with("app/app.proj");
        let cancel = CancellationToken::new();
        let debug = UnconfiguredProject::new("app/app.proj")
            .configured(ProjectConfiguration::new("Debug"));
        let release = UnconfiguredProject::new("app/app.proj")
            .configured(ProjectConfiguration::new("Release"));

        let first = collection.resolve_evaluated(&debug, &cancel).await.unwrap();
        let again = collection.resolve_evaluated(&debug, &cancel).await.unwrap();
        let other = collection.resolve_evaluated(&release, &cancel).await.unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.property("Configuration"), Some("Debug"));
        assert_eq!(other.property("Configuration"), Some("Release"));
    }

    #[tokio::test]
    async fn test_edit_document_invalidates_evaluated_view() {
        let (mut collection, _store) = collection_with("app/app.proj");
        let cancel = CancellationToken::new();
        let path = ProjectPath::new("app/app.proj");
        let debug = UnconfiguredProject::new("app/app.proj")
            .configured(ProjectConfiguration::new("Debug"));

        let stale = collection.resolve_evaluated(&debug, &cancel).await.unwrap();
        assert_eq!(stale.property("OutputType"), Some("Library"));

        collection
            .edit_document(&path, &cancel, |tree| {
                tree.set_property("OutputType", "Exe");
            })
            .await
            .unwrap();

        let fresh = collection.resolve_evaluated(&debug, &cancel).await.unwrap();
        assert_eq!(fresh.property("OutputType"), Some("Exe"));
        assert_eq!(fresh.document_version(), 1);
        // The stale snapshot is frozen, not updated in place
        assert_eq!(stale.property("OutputType"), Some("Library"));
    }

    #[tokio::test]
    async fn test_checkout_marks_loaded_document_pending() {
        let (mut collection, _store) = collection_with("app/app.proj");
        let cancel = CancellationToken::new();
        let path = ProjectPath::new("app/app.proj");

        collection.resolve_document(&path, &cancel).await.unwrap();
        collection.mark_checked_out(&path);

        let document = collection.resolve_document(&path, &cancel).await.unwrap();
        assert!(document.is_pending_write());
    }

    #[tokio::test]
    async fn test_checkout_before_load_marks_at_parse() {
        let (mut collection, _store) = collection_with("app/app.proj");
        let cancel = CancellationToken::new();
        let path = ProjectPath::new("app/app.proj");

        collection.mark_checked_out(&path);
        let document = collection.resolve_document(&path, &cancel).await.unwrap();
        assert!(document.is_pending_write());
    }

    #[tokio::test]
    async fn test_unload_drops_state() {
        let (mut collection, _store) = collection_with("app/app.proj");
        let cancel = CancellationToken::new();
        let path = ProjectPath::new("app/app.proj");

        collection.resolve_document(&path, &cancel).await.unwrap();
        assert!(collection.unload(&path));
        assert!(!collection.unload(&path));
        assert!(!collection.is_loaded(&path).await);
    }
}

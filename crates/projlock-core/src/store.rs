//! Document storage boundary
//!
//! The [`DocumentStore`] trait is the seam to the host's document
//! parser/loader: the coordinator never reads project files itself. Checkout
//! is the host-side "about to be edited" side effect (make the file
//! writable, engage pending-change tracking) and must be idempotent.
//!
//! [`MemoryDocumentStore`] is the built-in implementation used by hosts
//! without a real backend and by the test suite; it records load and
//! checkout counts so callers can assert on store traffic.

use crate::document::DocumentTree;
use crate::model::ProjectPath;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Host-side source of project documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load and parse the document backing `path`
    async fn load(
        &self,
        path: &ProjectPath,
        cancel: &CancellationToken,
    ) -> anyhow::Result<DocumentTree>;

    /// Mark the document as pending-write. Idempotent.
    async fn checkout(&self, path: &ProjectPath) -> anyhow::Result<()>;
}

/// In-memory document store
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<ProjectPath, DocumentTree>>,
    loads: Mutex<HashMap<ProjectPath, u64>>,
    checkouts: Mutex<HashMap<ProjectPath, u64>>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document, replacing any previous one at the same path
    pub fn insert(&self, document: DocumentTree) {
        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        documents.insert(document.path().clone(), document);
    }

    /// How many times the given document has been loaded
    pub fn load_count(&self, path: &ProjectPath) -> u64 {
        let loads = self.loads.lock().unwrap_or_else(PoisonError::into_inner);
        loads.get(path).copied().unwrap_or(0)
    }

    /// How many times the given document has been checked out
    pub fn checkout_count(&self, path: &ProjectPath) -> u64 {
        let checkouts = self
            .checkouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        checkouts.get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn load(
        &self,
        path: &ProjectPath,
        cancel: &CancellationToken,
    ) -> anyhow::Result<DocumentTree> {
        if cancel.is_cancelled() {
            anyhow::bail!("load of '{path}' cancelled");
        }

        let document = {
            let documents = self
                .documents
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            documents.get(path).cloned()
        };
        let document = document
            .ok_or_else(|| anyhow::anyhow!("no document registered for '{path}'"))?;

        let mut loads = self.loads.lock().unwrap_or_else(PoisonError::into_inner);
        *loads.entry(path.clone()).or_insert(0) += 1;

        Ok(document)
    }

    async fn checkout(&self, path: &ProjectPath) -> anyhow::Result<()> {
        {
            let documents = self
                .documents
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !documents.contains_key(path) {
                anyhow::bail!("cannot check out unknown document '{path}'");
            }
        }

        let mut checkouts = self
            .checkouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *checkouts.entry(path.clone()).or_insert(0) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentTree;

    fn store_with(path: &str) -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        store.insert(DocumentTree::empty(ProjectPath::new(path)));
        store
    }

    #[tokio::test]
    async fn test_load_returns_registered_document() {
        let store = store_with("app/app.proj");
        let path = ProjectPath::new("app/app.proj");

        let document = store.load(&path, &CancellationToken::new()).await.unwrap();
        assert_eq!(document.path(), &path);
        assert_eq!(store.load_count(&path), 1);
    }

    #[tokio::test]
    async fn test_load_unknown_path_fails() {
        let store = MemoryDocumentStore::new();
        let path = ProjectPath::new("missing.proj");

        let result = store.load(&path, &CancellationToken::new()).await;
        assert!(result.is_err());
        assert_eq!(store.load_count(&path), 0);
    }

    #[tokio::test]
    async fn test_load_observes_cancellation() {
        let store = store_with("app/app.proj");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = store.load(&ProjectPath::new("app/app.proj"), &cancel).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_checkout_counts_every_call() {
        let store = store_with("app/app.proj");
        let path = ProjectPath::new("app/app.proj");

        store.checkout(&path).await.unwrap();
        store.checkout(&path).await.unwrap();
        assert_eq!(store.checkout_count(&path), 2);

        let unknown = store.checkout(&ProjectPath::new("missing.proj")).await;
        assert!(unknown.is_err());
    }
}

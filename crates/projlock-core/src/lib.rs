//! Projlock Core Library
//!
//! This crate coordinates concurrent access to a shared, mutable in-memory
//! project model, including:
//! - Coordinator (read / write / upgradeable-read operations with
//!   checkout-before-mutate discipline)
//! - Locking (manager, scoped handles, lifecycle events, metrics)
//! - Model (project identities, evaluated views, the collection root)
//! - Document trees (the editable parse of a project's backing file)
//! - Host integration traits (document store, project evaluator)
//!
//! Any number of readers observe the model concurrently without tearing;
//! writers get exclusive access and must check a document out before
//! mutating it. See [`coordinator::ProjectCoordinator`] for the entry
//! point.

pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod evaluate;
pub mod locking;
pub mod model;
pub mod store;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CoordinatorConfig;
    pub use crate::coordinator::{DocumentEditScope, ProjectCoordinator};
    pub use crate::document::{DocumentNode, DocumentTree};
    pub use crate::error::{Error, Result};
    pub use crate::evaluate::{ProjectEvaluator, StandardEvaluator};
    pub use crate::locking::{LockEvent, LockEventKind, LockKind, MetricsSnapshot};
    pub use crate::model::{
        ConfiguredProject, EvaluatedProject, ProjectCollection, ProjectConfiguration,
        ProjectItem, ProjectPath, UnconfiguredProject,
    };
    pub use crate::store::{DocumentStore, MemoryDocumentStore};
    pub use tokio_util::sync::CancellationToken;
}

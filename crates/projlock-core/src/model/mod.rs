//! Project model: identities, evaluated views, and the collection root

pub mod collection;
pub mod evaluated;
pub mod project;

pub use collection::ProjectCollection;
pub use evaluated::{EvaluatedProject, ProjectItem};
pub use project::{ConfiguredProject, ProjectConfiguration, ProjectPath, UnconfiguredProject};

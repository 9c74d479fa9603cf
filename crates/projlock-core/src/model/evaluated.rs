//! Evaluated project views
//!
//! An [`EvaluatedProject`] is the resolved object model (properties, items,
//! targets) for one [`ConfiguredProject`] at one document version. Views are
//! produced by a [`crate::evaluate::ProjectEvaluator`] and cached by the
//! collection; a view whose recorded document version no longer matches the
//! document is stale and gets re-evaluated on the next resolution.

use crate::model::project::{ConfiguredProject, ProjectConfiguration, ProjectPath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One resolved item (kind + include + metadata)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectItem {
    kind: String,
    include: String,
    metadata: BTreeMap<String, String>,
}

impl ProjectItem {
    /// Create an item of the given kind
    pub fn new(kind: impl Into<String>, include: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            include: include.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry (builder style)
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    /// The item kind (e.g. `Compile`)
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The include path
    pub fn include(&self) -> &str {
        &self.include
    }

    /// Look up a metadata value
    pub fn metadata(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).map(String::as_str)
    }
}

/// The resolved object model for a configured project at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedProject {
    project: ConfiguredProject,
    document_version: u64,
    properties: BTreeMap<String, String>,
    items: Vec<ProjectItem>,
    targets: Vec<String>,
    evaluated_at: DateTime<Utc>,
}

impl EvaluatedProject {
    /// Create an empty view for a project at a document version
    pub fn new(project: ConfiguredProject, document_version: u64) -> Self {
        Self {
            project,
            document_version,
            properties: BTreeMap::new(),
            items: Vec::new(),
            targets: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }

    /// The configured project this view resolves
    pub fn project(&self) -> &ConfiguredProject {
        &self.project
    }

    /// The document path of the backing project
    pub fn path(&self) -> &ProjectPath {
        self.project.path()
    }

    /// The configuration this view was evaluated for
    pub fn configuration(&self) -> &ProjectConfiguration {
        self.project.configuration()
    }

    /// Version of the document this view was evaluated from
    pub fn document_version(&self) -> u64 {
        self.document_version
    }

    /// When this view was evaluated
    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }

    /// Look up a resolved property
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// All resolved properties
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Set a resolved property
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Remove a resolved property, returning the previous value
    pub fn remove_property(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }

    /// All resolved items
    pub fn items(&self) -> &[ProjectItem] {
        &self.items
    }

    /// Items of one kind
    pub fn items_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ProjectItem> {
        self.items.iter().filter(move |item| item.kind() == kind)
    }

    /// Append a resolved item
    pub fn add_item(&mut self, item: ProjectItem) {
        self.items.push(item);
    }

    /// All target names
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Append a target name
    pub fn add_target(&mut self, name: impl Into<String>) {
        self.targets.push(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::UnconfiguredProject;

    fn debug_project() -> ConfiguredProject {
        UnconfiguredProject::new("app/app.proj").configured(ProjectConfiguration::new("Debug"))
    }

    #[test]
    fn test_property_round_trip() {
        let mut view = EvaluatedProject::new(debug_project(), 3);
        view.set_property("OutputType", "Library");

        assert_eq!(view.property("OutputType"), Some("Library"));
        assert_eq!(view.document_version(), 3);
        assert_eq!(view.remove_property("OutputType"), Some("Library".to_string()));
        assert_eq!(view.property("OutputType"), None);
    }

    #[test]
    fn test_items_of_filters_by_kind() {
        let mut view = EvaluatedProject::new(debug_project(), 0);
        view.add_item(ProjectItem::new("Compile", "src/main.rs"));
        view.add_item(ProjectItem::new("Content", "assets/logo.png"));
        view.add_item(
            ProjectItem::new("Compile", "src/lib.rs").with_metadata("Visible", "false"),
        );

        let compile: Vec<_> = view.items_of("Compile").map(ProjectItem::include).collect();
        assert_eq!(compile, vec!["src/main.rs", "src/lib.rs"]);
        assert_eq!(
            view.items_of("Compile").nth(1).and_then(|i| i.metadata("Visible")),
            Some("false")
        );
    }
}

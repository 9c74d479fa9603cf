//! Mutable document trees backing project files
//!
//! A [`DocumentTree`] is the in-memory parse of one project document, keyed
//! by its [`ProjectPath`]. It carries a version counter (bumped once per
//! edit operation by the collection's edit paths) and a pending-write flag
//! (set by checkout). Trees are cheap to clone; the collection relies on
//! copy-on-write so that snapshots handed to readers stay frozen.

use crate::model::ProjectPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conventional element and attribute names for project documents
pub mod elements {
    /// Grouping element for property definitions
    pub const PROPERTY_GROUP: &str = "PropertyGroup";
    /// Grouping element for item definitions
    pub const ITEM_GROUP: &str = "ItemGroup";
    /// A build target definition
    pub const TARGET: &str = "Target";
    /// Attribute gating a group to one configuration name
    pub const CONFIGURATION_ATTR: &str = "Configuration";
    /// Attribute gating a group to one platform
    pub const PLATFORM_ATTR: &str = "Platform";
    /// Attribute holding an item's include path
    pub const INCLUDE_ATTR: &str = "Include";
    /// Attribute holding a target's name
    pub const NAME_ATTR: &str = "Name";
}

/// One element of a document tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    name: String,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// Create an element with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the text content (builder style)
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child element (builder style)
    pub fn with_child(mut self, child: DocumentNode) -> Self {
        self.children.push(child);
        self
    }

    /// The element name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set an attribute value
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// The text content, if any
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Set the text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// All child elements
    pub fn children(&self) -> &[DocumentNode] {
        &self.children
    }

    /// Mutable access to the child list
    pub fn children_mut(&mut self) -> &mut Vec<DocumentNode> {
        &mut self.children
    }

    /// First child with the given element name
    pub fn child(&self, name: &str) -> Option<&DocumentNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Mutable first child with the given element name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut DocumentNode> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    /// All children with the given element name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DocumentNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Append a child element
    pub fn push_child(&mut self, child: DocumentNode) {
        self.children.push(child);
    }
}

/// The in-memory mutable parse of one project document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTree {
    path: ProjectPath,
    version: u64,
    pending_write: bool,
    root: DocumentNode,
}

impl DocumentTree {
    /// Create a document tree from a parsed root element
    pub fn new(path: ProjectPath, root: DocumentNode) -> Self {
        Self {
            path,
            version: 0,
            pending_write: false,
            root,
        }
    }

    /// Create a document with an empty `Project` root
    pub fn empty(path: ProjectPath) -> Self {
        Self::new(path, DocumentNode::new("Project"))
    }

    /// The document path
    pub fn path(&self) -> &ProjectPath {
        &self.path
    }

    /// The edit version, bumped once per edit operation
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether this document has been checked out for writing
    pub fn is_pending_write(&self) -> bool {
        self.pending_write
    }

    /// The root element
    pub fn root(&self) -> &DocumentNode {
        &self.root
    }

    /// Mutable root element
    pub fn root_mut(&mut self) -> &mut DocumentNode {
        &mut self.root
    }

    pub(crate) fn mark_pending_write(&mut self) {
        self.pending_write = true;
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Look up a property value across all property groups (last one wins)
    pub fn property(&self, name: &str) -> Option<&str> {
        self.root
            .children
            .iter()
            .filter(|group| group.name == elements::PROPERTY_GROUP)
            .flat_map(|group| group.children.iter())
            .filter(|node| node.name == name)
            .next_back()
            .and_then(DocumentNode::text)
    }

    /// Set a property value, updating the last existing definition or
    /// appending to the first (created if necessary) property group
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        let existing = self
            .root
            .children
            .iter_mut()
            .filter(|group| group.name == elements::PROPERTY_GROUP)
            .flat_map(|group| group.children.iter_mut())
            .filter(|node| node.name == name)
            .next_back();
        if let Some(node) = existing {
            node.set_text(value);
            return;
        }

        if self.root.child(elements::PROPERTY_GROUP).is_none() {
            self.root.push_child(DocumentNode::new(elements::PROPERTY_GROUP));
        }
        if let Some(group) = self.root.child_mut(elements::PROPERTY_GROUP) {
            group.push_child(DocumentNode::new(name).with_text(value));
        }
    }

    /// All item elements of the given kind across item groups
    pub fn items<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a DocumentNode> {
        self.root
            .children_named(elements::ITEM_GROUP)
            .flat_map(|group| group.children())
            .filter(move |node| node.name() == kind)
    }

    /// Append an item to the first (created if necessary) item group
    pub fn add_item(&mut self, kind: impl Into<String>, include: impl Into<String>) {
        if self.root.child(elements::ITEM_GROUP).is_none() {
            self.root.push_child(DocumentNode::new(elements::ITEM_GROUP));
        }
        if let Some(group) = self.root.child_mut(elements::ITEM_GROUP) {
            group.push_child(
                DocumentNode::new(kind).with_attribute(elements::INCLUDE_ATTR, include),
            );
        }
    }

    /// Remove items of the given kind whose include matches; returns how many
    pub fn remove_items(&mut self, kind: &str, include: &str) -> usize {
        let mut removed = 0;
        for group in self
            .root
            .children
            .iter_mut()
            .filter(|group| group.name == elements::ITEM_GROUP)
        {
            let before = group.children.len();
            group.children.retain(|node| {
                node.name != kind || node.attribute(elements::INCLUDE_ATTR) != Some(include)
            });
            removed += before - group.children.len();
        }
        removed
    }

    /// Names of all targets defined in this document
    pub fn targets(&self) -> impl Iterator<Item = &str> + '_ {
        self.root
            .children_named(elements::TARGET)
            .filter_map(|node| node.attribute(elements::NAME_ATTR))
    }

    /// Append a target definition
    pub fn add_target(&mut self, name: impl Into<String>) {
        self.root.push_child(
            DocumentNode::new(elements::TARGET).with_attribute(elements::NAME_ATTR, name),
        );
    }
}

//! Project evaluation boundary
//!
//! The [`ProjectEvaluator`] trait is the seam to the host's evaluation
//! engine. [`StandardEvaluator`] is a minimal built-in: it flattens
//! property and item groups in document order (later definitions win),
//! honoring per-group configuration/platform gates, and records defined
//! targets. Hosts with a real engine supply their own implementation.

use crate::document::{elements, DocumentNode, DocumentTree};
use crate::model::{ConfiguredProject, EvaluatedProject, ProjectConfiguration, ProjectItem};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Computes the evaluated object model from a document tree
#[async_trait]
pub trait ProjectEvaluator: Send + Sync {
    /// Evaluate `document` for `project`'s configuration
    async fn evaluate(
        &self,
        document: &DocumentTree,
        project: &ConfiguredProject,
        cancel: &CancellationToken,
    ) -> anyhow::Result<EvaluatedProject>;
}

/// Built-in group-flattening evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEvaluator;

impl StandardEvaluator {
    /// Create the evaluator
    pub fn new() -> Self {
        Self
    }

    fn group_applies(group: &DocumentNode, configuration: &ProjectConfiguration) -> bool {
        if let Some(gate) = group.attribute(elements::CONFIGURATION_ATTR) {
            if gate != configuration.name() {
                return false;
            }
        }
        if let Some(gate) = group.attribute(elements::PLATFORM_ATTR) {
            if configuration.platform() != Some(gate) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl ProjectEvaluator for StandardEvaluator {
    async fn evaluate(
        &self,
        document: &DocumentTree,
        project: &ConfiguredProject,
        cancel: &CancellationToken,
    ) -> anyhow::Result<EvaluatedProject> {
        if cancel.is_cancelled() {
            anyhow::bail!("evaluation of '{}' cancelled", project.path());
        }

        let configuration = project.configuration();
        let mut evaluated = EvaluatedProject::new(project.clone(), document.version());

        // Reserved properties mirror the configuration dimensions
        evaluated.set_property("Configuration", configuration.name());
        if let Some(platform) = configuration.platform() {
            evaluated.set_property("Platform", platform);
        }

        for group in document
            .root()
            .children_named(elements::PROPERTY_GROUP)
            .filter(|group| Self::group_applies(group, configuration))
        {
            for property in group.children() {
                evaluated.set_property(property.name(), property.text().unwrap_or_default());
            }
        }

        for group in document
            .root()
            .children_named(elements::ITEM_GROUP)
            .filter(|group| Self::group_applies(group, configuration))
        {
            for node in group.children() {
                let mut item = ProjectItem::new(
                    node.name(),
                    node.attribute(elements::INCLUDE_ATTR).unwrap_or_default(),
                );
                for metadata in node.children() {
                    item = item.with_metadata(
                        metadata.name(),
                        metadata.text().unwrap_or_default(),
                    );
                }
                evaluated.add_item(item);
            }
        }

        for name in document.targets() {
            evaluated.add_target(name);
        }

        Ok(evaluated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectPath, UnconfiguredProject};

    fn document() -> DocumentTree {
        DocumentTree::new(
            ProjectPath::new("app/app.proj"),
            DocumentNode::new("Project")
                .with_child(
                    DocumentNode::new(elements::PROPERTY_GROUP)
                        .with_child(DocumentNode::new("OutputType").with_text("Library"))
                        .with_child(DocumentNode::new("Optimize").with_text("false")),
                )
                .with_child(
                    DocumentNode::new(elements::PROPERTY_GROUP)
                        .with_attribute(elements::CONFIGURATION_ATTR, "Release")
                        .with_child(DocumentNode::new("Optimize").with_text("true")),
                )
                .with_child(
                    DocumentNode::new(elements::ITEM_GROUP).with_child(
                        DocumentNode::new("Compile")
                            .with_attribute(elements::INCLUDE_ATTR, "src/main.rs")
                            .with_child(DocumentNode::new("Visible").with_text("false")),
                    ),
                )
                .with_child(
                    DocumentNode::new(elements::TARGET)
                        .with_attribute(elements::NAME_ATTR, "Build"),
                ),
        )
    }

    fn configured(name: &str) -> ConfiguredProject {
        UnconfiguredProject::new("app/app.proj").configured(ProjectConfiguration::new(name))
    }

    #[tokio::test]
    async fn test_evaluate_flattens_unconditioned_groups() {
        let evaluated = StandardEvaluator::new()
            .evaluate(&document(), &configured("Debug"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(evaluated.property("OutputType"), Some("Library"));
        assert_eq!(evaluated.property("Optimize"), Some("false"));
        assert_eq!(evaluated.property("Configuration"), Some("Debug"));
        assert_eq!(evaluated.targets().to_vec(), vec!["Build".to_string()]);
    }

    #[tokio::test]
    async fn test_evaluate_applies_configuration_gated_groups() {
        let evaluated = StandardEvaluator::new()
            .evaluate(&document(), &configured("Release"), &CancellationToken::new())
            .await
            .unwrap();

        // The Release-gated group overrides the unconditioned definition
        assert_eq!(evaluated.property("Optimize"), Some("true"));
    }

    #[tokio::test]
    async fn test_evaluate_skips_platform_mismatched_groups() {
        let mut tree = document();
        tree.root_mut().push_child(
            DocumentNode::new(elements::PROPERTY_GROUP)
                .with_attribute(elements::PLATFORM_ATTR, "x64")
                .with_child(DocumentNode::new("Vectorize").with_text("true")),
        );

        let no_platform = StandardEvaluator::new()
            .evaluate(&tree, &configured("Debug"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(no_platform.property("Vectorize"), None);

        let x64 = UnconfiguredProject::new("app/app.proj")
            .configured(ProjectConfiguration::new("Debug").with_platform("x64"));
        let with_platform = StandardEvaluator::new()
            .evaluate(&tree, &x64, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(with_platform.property("Vectorize"), Some("true"));
        assert_eq!(with_platform.property("Platform"), Some("x64"));
    }

    #[tokio::test]
    async fn test_evaluate_collects_item_metadata() {
        let evaluated = StandardEvaluator::new()
            .evaluate(&document(), &configured("Debug"), &CancellationToken::new())
            .await
            .unwrap();

        let item = evaluated.items_of("Compile").next().unwrap();
        assert_eq!(item.include(), "src/main.rs");
        assert_eq!(item.metadata("Visible"), Some("false"));
    }

    #[tokio::test]
    async fn test_evaluate_records_document_version() {
        let project = configured("Debug");
        let evaluated = StandardEvaluator::new()
            .evaluate(&document(), &project, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(evaluated.document_version(), 0);
    }
}

//! Project identities: paths, configurations, and their combinations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Path of a project's backing document, used as the project identity key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectPath(PathBuf);

impl ProjectPath {
    /// Create a project path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The underlying filesystem path
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Whether the path is empty (an invalid identity)
    pub fn is_empty(&self) -> bool {
        self.0.as_os_str().is_empty()
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for ProjectPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for ProjectPath {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// A project identity independent of build configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnconfiguredProject {
    path: ProjectPath,
}

impl UnconfiguredProject {
    /// Create a project identity from its document path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: ProjectPath::new(path),
        }
    }

    /// The document path keying this project
    pub fn path(&self) -> &ProjectPath {
        &self.path
    }

    /// Resolve this project against a build configuration
    pub fn configured(&self, configuration: ProjectConfiguration) -> ConfiguredProject {
        ConfiguredProject::new(self.clone(), configuration)
    }
}

impl fmt::Display for UnconfiguredProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// A build configuration: a configuration name plus an optional platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectConfiguration {
    name: String,
    platform: Option<String>,
}

impl ProjectConfiguration {
    /// Create a configuration with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: None,
        }
    }

    /// Add a platform dimension
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// The configuration name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The platform dimension, if any
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Cache key for this configuration ("Debug" or "Debug|x64")
    pub fn key(&self) -> String {
        match &self.platform {
            Some(platform) => format!("{}|{}", self.name, platform),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for ProjectConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// An unconfigured project resolved against one build configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfiguredProject {
    project: UnconfiguredProject,
    configuration: ProjectConfiguration,
}

impl ConfiguredProject {
    /// Pair a project identity with a build configuration
    pub fn new(project: UnconfiguredProject, configuration: ProjectConfiguration) -> Self {
        Self {
            project,
            configuration,
        }
    }

    /// The configuration-independent project identity
    pub fn unconfigured(&self) -> &UnconfiguredProject {
        &self.project
    }

    /// The document path keying this project
    pub fn path(&self) -> &ProjectPath {
        self.project.path()
    }

    /// The build configuration
    pub fn configuration(&self) -> &ProjectConfiguration {
        &self.configuration
    }
}

impl fmt::Display for ConfiguredProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.project, self.configuration)
    }
}

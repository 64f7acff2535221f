use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::artifact::Artifact;
use crate::models::ecosystem::EcosystemKind;

/// What a resolver emits: an exact, ecosystem-scoped version with its
/// selected artifact attached once the candidate selector has run, per
/// spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub kind: EcosystemKind,
    pub name: String,
    pub exact_version: String,
    pub architecture: Option<String>,
    pub classifier: Option<String>,
    pub build_string: Option<String>,
    pub artifact: Option<Artifact>,
    /// Populated by the download scheduler once the blob lands on disk.
    pub file_path: Option<PathBuf>,
    /// npm only: the `node_modules/.../node_modules/name` path this node was
    /// hoisted or nested to, per spec §4.5's Arborist placement rules.
    /// `None` for every other ecosystem.
    pub node_modules_path: Option<String>,
}

impl ResolvedPackage {
    pub fn new(kind: EcosystemKind, name: impl Into<String>, exact_version: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            exact_version: exact_version.into(),
            architecture: None,
            classifier: None,
            build_string: None,
            artifact: None,
            file_path: None,
            node_modules_path: None,
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_node_modules_path(mut self, path: impl Into<String>) -> Self {
        self.node_modules_path = Some(path.into());
        self
    }

    pub fn package_key(&self) -> String {
        format!("{}:{}", self.kind, crate::models::package_ref::normalize_name(self.kind, &self.name))
    }

    pub fn identifier(&self) -> String {
        format!("{}@{}", self.name, self.exact_version)
    }
}

use serde::{Deserialize, Serialize};

/// Records a version conflict and how it was resolved, per spec §3. Emitted
/// alongside the graph rather than hidden inside it (invariant iv).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub package_key: String,
    pub requested_specs: Vec<RequestedSpec>,
    pub chosen_version: String,
    pub rule: ConflictRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedSpec {
    pub requester: String,
    pub version_spec: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictRule {
    NearestWins,
    HighestCompatible,
    FirstDeclaration,
    UserOverride,
}

impl ConflictRecord {
    pub fn new(
        package_key: impl Into<String>,
        chosen_version: impl Into<String>,
        rule: ConflictRule,
    ) -> Self {
        Self {
            package_key: package_key.into(),
            requested_specs: Vec::new(),
            chosen_version: chosen_version.into(),
            rule,
        }
    }

    pub fn requested_by(mut self, requester: impl Into<String>, version_spec: impl Into<String>) -> Self {
        self.requested_specs.push(RequestedSpec {
            requester: requester.into(),
            version_spec: version_spec.into(),
        });
        self
    }
}

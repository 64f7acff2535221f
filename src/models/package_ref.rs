use serde::{Deserialize, Serialize};

use crate::models::ecosystem::EcosystemKind;

/// What the user or a resolver asks for: a name plus an ecosystem-specific
/// version range expression (PEP 440, semver, Maven, MatchSpec, or an exact
/// string for OS packages), per spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub kind: EcosystemKind,
    pub name: String,
    pub version_spec: String,
    /// PEP 508 extras (PyPI only, e.g. `requests[socks]`).
    pub extras: Vec<String>,
    /// Maven/OS-package classifier (e.g. `sources`, `linux-x86_64`).
    pub classifier: Option<String>,
    /// Conda channel (e.g. `conda-forge`) or npm registry override.
    pub channel: Option<String>,
    /// Maven repository base URL override, or an OCI registry host.
    pub repository: Option<String>,
    /// Whether resolution failure for this ref should downgrade to a warning
    /// (spec §7: "optional dependencies downgrade all non-Cancelled kinds").
    pub optional: bool,
}

impl PackageRef {
    pub fn new(kind: EcosystemKind, name: impl Into<String>, version_spec: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            version_spec: version_spec.into(),
            extras: Vec::new(),
            classifier: None,
            channel: None,
            repository: None,
            optional: false,
        }
    }

    pub fn with_extras(mut self, extras: Vec<String>) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// A stable cross-ecosystem key for graph nodes and conflict bookkeeping.
    pub fn package_key(&self) -> String {
        format!("{}:{}", self.kind, normalize_name(self.kind, &self.name))
    }
}

/// Normalizes a package name the way the owning registry does, per spec §4.1
/// ("Keys are normalized per ecosystem").
pub fn normalize_name(kind: EcosystemKind, name: &str) -> String {
    match kind {
        EcosystemKind::Pypi => {
            let folded: String = name
                .chars()
                .map(|c| if c == '-' || c == '_' || c == '.' { '-' } else { c })
                .collect();
            collapse_dashes(&folded.to_lowercase())
        }
        EcosystemKind::Npm => name.to_lowercase(),
        _ => name.to_lowercase(),
    }
}

fn collapse_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = false;
    for c in s.chars() {
        if c == '-' {
            if !last_dash {
                out.push('-');
            }
            last_dash = true;
        } else {
            out.push(c);
            last_dash = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pypi_names_fold_separators_and_lowercase() {
        assert_eq!(normalize_name(EcosystemKind::Pypi, "Django_Rest.Framework"), "django-rest-framework");
        assert_eq!(normalize_name(EcosystemKind::Pypi, "foo--bar__baz"), "foo-bar-baz");
    }

    #[test]
    fn npm_scoped_names_keep_slash() {
        assert_eq!(normalize_name(EcosystemKind::Npm, "@Types/Node"), "@types/node");
    }

    #[test]
    fn package_key_is_stable_across_ecosystems() {
        let a = PackageRef::new(EcosystemKind::Pypi, "Requests", "==2.28.0");
        let b = PackageRef::new(EcosystemKind::Pypi, "requests", "==2.28.0");
        assert_eq!(a.package_key(), b.package_key());
    }
}

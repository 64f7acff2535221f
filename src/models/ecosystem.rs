use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of package ecosystems the engine knows how to resolve and fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EcosystemKind {
    Pypi,
    Conda,
    Npm,
    Maven,
    Yum,
    Apt,
    Apk,
    Oci,
}

impl EcosystemKind {
    pub fn all() -> &'static [EcosystemKind] {
        &[
            EcosystemKind::Pypi,
            EcosystemKind::Conda,
            EcosystemKind::Npm,
            EcosystemKind::Maven,
            EcosystemKind::Yum,
            EcosystemKind::Apt,
            EcosystemKind::Apk,
            EcosystemKind::Oci,
        ]
    }

    /// Whether this ecosystem resolves transitive dependencies at all.
    /// OCI images have no dependency graph of their own (spec §4.5: "degenerate resolver").
    pub fn has_transitive_deps(&self) -> bool {
        !matches!(self, EcosystemKind::Oci)
    }

    /// Default traversal depth bound per spec §4.5.
    pub fn default_max_depth(&self) -> usize {
        match self {
            EcosystemKind::Pypi | EcosystemKind::Conda | EcosystemKind::Maven => 10,
            EcosystemKind::Npm => 50,
            EcosystemKind::Yum | EcosystemKind::Apt | EcosystemKind::Apk => 5,
            EcosystemKind::Oci => 0,
        }
    }
}

impl fmt::Display for EcosystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EcosystemKind::Pypi => "pypi",
            EcosystemKind::Conda => "conda",
            EcosystemKind::Npm => "npm",
            EcosystemKind::Maven => "maven",
            EcosystemKind::Yum => "yum",
            EcosystemKind::Apt => "apt",
            EcosystemKind::Apk => "apk",
            EcosystemKind::Oci => "oci",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EcosystemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pypi" | "pip" | "python" | "py" => Ok(EcosystemKind::Pypi),
            "conda" | "anaconda" => Ok(EcosystemKind::Conda),
            "npm" | "node" | "javascript" | "js" => Ok(EcosystemKind::Npm),
            "maven" | "mvn" | "java" => Ok(EcosystemKind::Maven),
            "yum" | "rpm" => Ok(EcosystemKind::Yum),
            "apt" | "deb" | "debian" => Ok(EcosystemKind::Apt),
            "apk" | "alpine" => Ok(EcosystemKind::Apk),
            "oci" | "docker" | "image" => Ok(EcosystemKind::Oci),
            other => Err(format!("unknown ecosystem: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for kind in EcosystemKind::all() {
            let parsed: EcosystemKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn aliases_resolve_to_the_same_kind() {
        assert_eq!("pip".parse::<EcosystemKind>().unwrap(), EcosystemKind::Pypi);
        assert_eq!("node".parse::<EcosystemKind>().unwrap(), EcosystemKind::Npm);
        assert_eq!("rpm".parse::<EcosystemKind>().unwrap(), EcosystemKind::Yum);
        assert_eq!("debian".parse::<EcosystemKind>().unwrap(), EcosystemKind::Apt);
    }

    #[test]
    fn oci_has_no_transitive_deps() {
        assert!(!EcosystemKind::Oci.has_transitive_deps());
        assert!(EcosystemKind::Npm.has_transitive_deps());
    }
}

//! npm semver comparison and range matching, backed by the `semver` crate
//! (also used by `rust-lang/cargo`'s own resolver in the retrieval pack).

use std::cmp::Ordering;

use semver::{Version, VersionReq};

use super::VersionOrdering;

pub struct NpmSemver;

impl VersionOrdering for NpmSemver {
    fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        let va = Version::parse(a).ok()?;
        let vb = Version::parse(b).ok()?;
        Some(va.cmp(&vb))
    }

    fn satisfies(&self, version: &str, spec: &str) -> bool {
        if spec == "*" || spec == "latest" {
            return true;
        }
        let Ok(v) = Version::parse(version) else { return false };
        let Ok(req) = VersionReq::parse(spec) else { return false };
        req.matches(&v)
    }
}

/// Filters prereleases out unless the caller explicitly opts in, per
/// spec §4.5 ("exact, then semver range over non-prerelease versions, then
/// include-prerelease retry").
pub fn is_prerelease(version: &str) -> bool {
    Version::parse(version).map(|v| !v.pre.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_range_excludes_next_major() {
        let ordering = NpmSemver;
        assert!(ordering.satisfies("1.4.2", "^1.0.0"));
        assert!(!ordering.satisfies("2.0.0", "^1.0.0"));
    }

    #[test]
    fn prerelease_versions_are_flagged() {
        assert!(is_prerelease("1.0.0-beta.1"));
        assert!(!is_prerelease("1.0.0"));
    }
}

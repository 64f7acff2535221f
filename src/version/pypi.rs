//! PEP 440 version comparison and range matching, backed by `pep440_rs`
//! (the same crate the `prefix-dev-rip` workspace depends on for its PyPI
//! resolver).

use std::cmp::Ordering;
use std::str::FromStr;

use pep440_rs::{Version, VersionSpecifiers};

use super::VersionOrdering;

pub struct Pep440;

impl VersionOrdering for Pep440 {
    fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        let va = Version::from_str(a).ok()?;
        let vb = Version::from_str(b).ok()?;
        va.partial_cmp(&vb)
    }

    fn satisfies(&self, version: &str, spec: &str) -> bool {
        let Ok(v) = Version::from_str(version) else { return false };
        let Ok(specifiers) = VersionSpecifiers::from_str(spec) else { return false };
        specifiers.contains(&v)
    }
}

/// Whether `version` carries a pre-release or dev segment (PEP 440 §typing),
/// used to exclude such versions from resolution unless explicitly allowed.
pub fn is_prerelease(version: &str) -> bool {
    Version::from_str(version).map(|v| v.any_prerelease()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epochs_order_above_plain_versions() {
        let ordering = Pep440;
        assert_eq!(ordering.compare("1!1.0", "2.0").unwrap(), Ordering::Greater);
    }

    #[test]
    fn range_specifier_matches() {
        let ordering = Pep440;
        assert!(ordering.satisfies("2.28.0", "==2.28.0"));
        assert!(ordering.satisfies("2.28.1", ">=2.28.0,<3.0.0"));
        assert!(!ordering.satisfies("3.0.0", ">=2.28.0,<3.0.0"));
    }
}

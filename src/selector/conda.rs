//! Conda candidate selection: filters a repodata listing down to one
//! package record for a target, per spec §4.4 ("filter by (name, version,
//! subdir in {targetSubdir, noarch}); filter by interpreter tag if set;
//! prefer noarch; else highest build_number; else latest upload_time").
//!
//! `repodata.json` carries no upload timestamp on the record itself (only
//! the enclosing document does, channel-wide), so the tie-break after
//! `build_number` falls back to the build string's own ordering, which is
//! the closest stable proxy repodata actually offers.

use crate::models::target::TargetDescriptor;
use crate::platform::conda_subdir;
use crate::registry::conda::CondaPackageRecord;
use crate::version::conda::CondaVersion;
use crate::version::VersionOrdering;

/// Picks the best record for `name`/`version_spec` out of a combined
/// `{target-subdir, noarch}` candidate pool, per spec §4.3/§4.4.
pub fn select_best<'a>(
    records: &'a [(&'a str, &'a CondaPackageRecord)],
    target: &TargetDescriptor,
    version_spec: &str,
    interpreter_tag: Option<&str>,
) -> Option<&'a CondaPackageRecord> {
    let target_subdir = conda_subdir(target);
    let ordering = CondaVersion;

    let mut candidates: Vec<&CondaPackageRecord> = records
        .iter()
        .map(|(_, r)| *r)
        .filter(|r| Some(r.subdir.as_str()) == target_subdir || r.subdir == "noarch")
        .filter(|r| ordering.satisfies(&r.version, version_spec))
        .filter(|r| match interpreter_tag {
            Some(tag) => r.build.contains(tag),
            None => true,
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| {
        let noarch_rank = |r: &CondaPackageRecord| if r.subdir == "noarch" { 0 } else { 1 };
        noarch_rank(a)
            .cmp(&noarch_rank(b))
            .then_with(|| ordering.compare(&b.version, &a.version).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| b.build_number.cmp(&a.build_number))
            .then_with(|| b.build.cmp(&a.build))
    });

    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::target::{Arch, Os};

    fn record(subdir: &str, version: &str, build: &str, build_number: u64) -> CondaPackageRecord {
        CondaPackageRecord {
            name: "six".to_string(),
            version: version.to_string(),
            build: build.to_string(),
            build_number,
            depends: vec![],
            constrains: vec![],
            subdir: subdir.to_string(),
            sha256: None,
            md5: None,
            size: None,
        }
    }

    #[test]
    fn noarch_wins_over_arch_specific_build() {
        let noarch = record("noarch", "1.16.0", "pyh6c4a22f_0", 0);
        let linux = record("linux-64", "1.16.0", "py311h06a4308_0", 0);
        let pool: Vec<(&str, &CondaPackageRecord)> = vec![("noarch", &noarch), ("linux-64", &linux)];
        let target = TargetDescriptor::new(Os::Linux, Arch::X86_64);
        let selected = select_best(&pool, &target, "1.16.0", None).unwrap();
        assert_eq!(selected.subdir, "noarch");
    }

    #[test]
    fn higher_build_number_wins_among_equal_versions() {
        let a = record("noarch", "1.16.0", "pyh6c4a22f_0", 0);
        let b = record("noarch", "1.16.0", "pyh6c4a22f_1", 1);
        let pool: Vec<(&str, &CondaPackageRecord)> = vec![("noarch", &a), ("noarch", &b)];
        let target = TargetDescriptor::new(Os::Linux, Arch::X86_64);
        let selected = select_best(&pool, &target, "1.16.0", None).unwrap();
        assert_eq!(selected.build_number, 1);
    }

    #[test]
    fn version_spec_filters_out_non_matching_releases() {
        let old = record("noarch", "1.10.0", "pyh0000000_0", 0);
        let new = record("noarch", "1.16.0", "pyh6c4a22f_0", 0);
        let pool: Vec<(&str, &CondaPackageRecord)> = vec![("noarch", &old), ("noarch", &new)];
        let target = TargetDescriptor::new(Os::Linux, Arch::X86_64);
        let selected = select_best(&pool, &target, ">=1.16.0", None).unwrap();
        assert_eq!(selected.version, "1.16.0");
    }
}

//! Conda resolver: BFS over `depends` strings in repodata, each resolved
//! against a merged `{target-subdir, noarch}` candidate pool per package,
//! per spec §4.5 ("YUM/APT/APK-style closed BFS" shape, but against a
//! per-channel repodata document rather than a whole-distro index).
//!
//! `packages` and `packages.conda` are merged with the latter preferred,
//! per spec §4.2 ("Merge `packages` and `packages.conda` records with the
//! latter preferred").

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::ecosystem::EcosystemKind;
use crate::models::failure::FailureRecord;
use crate::models::options::CommonOptions;
use crate::models::package_ref::PackageRef;
use crate::models::resolved_package::ResolvedPackage;
use crate::models::target::TargetDescriptor;
use crate::platform::conda_subdir;
use crate::registry::conda::{record_to_artifact, CondaClient, CondaPackageRecord};
use crate::selector::conda::select_best;

use super::ResolveOutcome;

const DEFAULT_CHANNEL: &str = "conda-forge";

/// One `(filename, record)` pool merged from a subdir's repodata and the
/// channel's shared `noarch` repodata.
async fn merged_pool(
    client: &CondaClient,
    channel: &str,
    subdir: &str,
) -> Result<HashMap<String, CondaPackageRecord>, crate::registry::conda::CondaError> {
    let repodata = client.get_repodata(channel, subdir).await?;
    let mut pool = repodata.packages;
    // `.conda` entries are preferred over the legacy `.tar.bz2` listing for
    // the same filename stem, per spec §4.2.
    for (name, record) in repodata.packages_conda {
        pool.insert(name, record);
    }
    Ok(pool)
}

pub async fn resolve(
    roots: &[PackageRef],
    target: &TargetDescriptor,
    http: &SharedClients,
    cache: &Arc<MetadataCache>,
    common: &CommonOptions,
) -> ResolveOutcome {
    let client = CondaClient::new(http.clone(), cache.clone());
    let max_depth = common.max_depth.unwrap_or(EcosystemKind::Conda.default_max_depth());
    let mut outcome = ResolveOutcome::default();

    let Some(target_subdir) = conda_subdir(target) else {
        outcome.failures.push(FailureRecord::new(
            "conda:*",
            EcosystemKind::Conda,
            "ConfigError",
            format!("no conda subdir mapping for {}/{}", target.os, target.arch),
        ));
        return outcome;
    };
    let interpreter_tag = target
        .interpreter
        .as_ref()
        .and_then(|i| i.major_minor())
        .map(|(major, minor)| format!("py{major}{minor}"));

    for root in roots {
        let channel = root.channel.clone().unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

        let arch_pool = match merged_pool(&client, &channel, target_subdir).await {
            Ok(p) => p,
            Err(err) => {
                outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Conda, "NetworkFailure", err.to_string()));
                continue;
            }
        };
        let noarch_pool = match merged_pool(&client, &channel, "noarch").await {
            Ok(p) => p,
            Err(err) => {
                outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Conda, "NetworkFailure", err.to_string()).as_warning());
                HashMap::new()
            }
        };

        let mut by_name: HashMap<String, Vec<(String, CondaPackageRecord)>> = HashMap::new();
        for (filename, record) in arch_pool.into_iter().chain(noarch_pool.into_iter()) {
            by_name.entry(record.name.clone()).or_default().push((filename, record));
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, String, usize)> = VecDeque::new();
        queue.push_back((root.name.clone(), root.version_spec.clone(), 0));

        while let Some((name, version_spec, depth)) = queue.pop_front() {
            if depth > max_depth || !visited.insert(name.clone()) {
                continue;
            }

            let Some(entries) = by_name.get(&name) else {
                outcome.failures.push(FailureRecord::new(format!("conda:{name}"), EcosystemKind::Conda, "NotFound", format!("{name} not found in {channel}")));
                continue;
            };

            let pool: Vec<(&str, &CondaPackageRecord)> = entries.iter().map(|(f, r)| (f.as_str(), r)).collect();
            let Some(record) = select_best(&pool, target, &version_spec, interpreter_tag.as_deref()) else {
                outcome.failures.push(FailureRecord::new(
                    format!("conda:{name}"),
                    EcosystemKind::Conda,
                    "NoCompatibleArtifact",
                    format!("no candidate for {name}{version_spec} matches {target_subdir}/noarch"),
                ));
                continue;
            };

            let filename = entries
                .iter()
                .find(|(_, r)| std::ptr::eq(r, record))
                .map(|(f, _)| f.clone())
                .unwrap_or_else(|| format!("{name}-{}-{}.conda", record.version, record.build));
            let artifact = record_to_artifact(record, &channel, &filename);
            let package = ResolvedPackage::new(EcosystemKind::Conda, &name, &record.version).with_artifact(artifact);
            let id = outcome.graph.add_node(package);
            if depth == 0 {
                outcome.graph.mark_root(id);
            }

            for depend in &record.depends {
                if let Some((dep_name, dep_spec)) = split_depend(depend) {
                    // `python_abi`, `__glibc`, `__cuda`-style markers are
                    // platform facts, not fetchable packages.
                    if dep_name.starts_with("__") {
                        continue;
                    }
                    queue.push_back((dep_name, dep_spec, depth + 1));
                }
            }
        }
    }

    outcome
}

/// Splits a conda `depends` entry (`"python >=3.11,<3.12.0a0"`) into its
/// package name and the remainder as a version spec string. Entries with no
/// version constraint (`"setuptools"`) get an empty spec, which
/// [`crate::version::conda::CondaVersion::satisfies`] treats as "any".
fn split_depend(depend: &str) -> Option<(String, String)> {
    let depend = depend.trim();
    if depend.is_empty() {
        return None;
    }
    match depend.split_once(' ') {
        Some((name, rest)) => Some((name.to_string(), rest.trim().to_string())),
        None => Some((depend.to_string(), String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_depend_separates_name_from_constraint() {
        assert_eq!(split_depend("python >=3.11,<3.12.0a0"), Some(("python".to_string(), ">=3.11,<3.12.0a0".to_string())));
        assert_eq!(split_depend("setuptools"), Some(("setuptools".to_string(), String::new())));
        assert_eq!(split_depend(""), None);
    }
}

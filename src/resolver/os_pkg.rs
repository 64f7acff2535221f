//! YUM/APT/APK resolver: a single closed BFS over virtual providers, per
//! spec §4.4 ("OS package ecosystems resolve a closed dependency set
//! against the repository's whole package index, not an external registry
//! per name — depends entries may name either a real package or a virtual
//! capability, and either can be provided by more than one package").
//!
//! Kept as three concrete functions rather than one trait-based resolver:
//! each registry's index document and depends-string syntax differ enough
//! (RPM `Requires`/`Provides` elements vs. Debian comma/pipe-separated
//! `Depends` vs. Alpine's `so:`-prefixed tokens) that a shared abstraction
//! would mostly be per-ecosystem `match` arms in disguise.

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
use crate::registry::apk::{record_to_artifact as apk_artifact, ApkClient};
use crate::registry::apt::{stanza_to_artifact, AptClient, DebStanza};
use crate::registry::yum::{package_to_artifact, PrimaryPackage, YumClient};
use crate::selector::os_pkg::arch_matches;

use super::ResolveOutcome;

pub async fn resolve_yum(roots: &[PackageRef], target: &TargetDescriptor, http: &SharedClients, cache: &Arc<MetadataCache>, common: &CommonOptions) -> ResolveOutcome {
    let client = YumClient::new(http.clone(), cache.clone());
    let max_depth = common.max_depth.unwrap_or(EcosystemKind::Yum.default_max_depth());
    let mut outcome = ResolveOutcome::default();

    for root in roots {
        let Some(repo_base_url) = root.repository.clone() else {
            outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Yum, "ConfigError", "no repository base URL configured"));
            continue;
        };
        let primary = match client.get_primary(&repo_base_url).await {
            Ok(p) => p,
            Err(err) => {
                outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Yum, "NetworkFailure", err.to_string()));
                continue;
            }
        };

        let mut provides_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, pkg) in primary.package.iter().enumerate() {
            provides_index.entry(pkg.name.clone()).or_default().push(i);
            if let Some(format) = &pkg.format.provides {
                for entry in &format.entry {
                    provides_index.entry(entry.name.clone()).or_default().push(i);
                }
            }
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((root.name.clone(), 0));

        while let Some((capability, depth)) = queue.pop_front() {
            if depth > max_depth || !visited.insert(capability.clone()) {
                continue;
            }
            let Some(candidates) = provides_index.get(&capability) else {
                outcome.failures.push(FailureRecord::new(format!("yum:{capability}"), EcosystemKind::Yum, "NotFound", format!("no package provides {capability}")));
                continue;
            };
            let Some(&idx) = candidates.iter().find(|&&i| arch_matches(&primary.package[i].arch, target)) else {
                outcome.failures.push(FailureRecord::new(format!("yum:{capability}"), EcosystemKind::Yum, "NoCompatibleArtifact", "no candidate matches target architecture"));
                continue;
            };
            let pkg: &PrimaryPackage = &primary.package[idx];
            let artifact = package_to_artifact(pkg, &repo_base_url);
            let package = ResolvedPackage::new(EcosystemKind::Yum, &pkg.name, crate::registry::yum::evr(&pkg.version)).with_artifact(artifact);
            let id = outcome.graph.add_node(package);
            if depth == 0 {
                outcome.graph.mark_root(id);
            }
            if let Some(format) = &pkg.format.requires {
                for entry in &format.entry {
                    queue.push_back((entry.name.clone(), depth + 1));
                }
            }
        }
    }

    outcome
}

pub async fn resolve_apt(
    roots: &[PackageRef],
    target: &TargetDescriptor,
    suite: &str,
    component: &str,
    http: &SharedClients,
    cache: &Arc<MetadataCache>,
    common: &CommonOptions,
) -> ResolveOutcome {
    let client = AptClient::new(http.clone(), cache.clone());
    let max_depth = common.max_depth.unwrap_or(EcosystemKind::Apt.default_max_depth());
    let deb_arch = crate::platform::substitute_deb_arch("$arch", target);
    let mut outcome = ResolveOutcome::default();

    for root in roots {
        let Some(repo_base_url) = root.repository.clone() else {
            outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Apt, "ConfigError", "no repository base URL configured"));
            continue;
        };
        let stanzas = match client.get_packages(&repo_base_url, suite, component, &deb_arch).await {
            Ok(s) => s,
            Err(err) => {
                outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Apt, "NetworkFailure", err.to_string()));
                continue;
            }
        };
        let by_name: HashMap<&str, &DebStanza> = stanzas.iter().filter_map(|s| s.get("Package").map(|n| (n, s))).collect();

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((root.name.clone(), 0));

        while let Some((name, depth)) = queue.pop_front() {
            if depth > max_depth || !visited.insert(name.clone()) {
                continue;
            }
            let Some(stanza) = by_name.get(name.as_str()) else {
                outcome.failures.push(FailureRecord::new(format!("apt:{name}"), EcosystemKind::Apt, "NotFound", format!("{name} not found in {suite}/{component}")));
                continue;
            };
            let Some(artifact) = stanza_to_artifact(stanza, &repo_base_url) else { continue };
            let version = stanza.get("Version").unwrap_or_default().to_string();
            let package = ResolvedPackage::new(EcosystemKind::Apt, &name, version).with_artifact(artifact);
            let id = outcome.graph.add_node(package);
            if depth == 0 {
                outcome.graph.mark_root(id);
            }
            if let Some(depends) = stanza.get("Depends") {
                for dep_group in depends.split(',') {
                    // Only the first alternative in an `a | b` group is
                    // pulled transitively; offline-transfer closures don't
                    // need every alternative satisfied, just one.
                    if let Some(first) = dep_group.split('|').next() {
                        let dep_name = first.trim().split(' ').next().unwrap_or("").trim();
                        if !dep_name.is_empty() {
                            queue.push_back((dep_name.to_string(), depth + 1));
                        }
                    }
                }
            }
        }
    }

    outcome
}

pub async fn resolve_apk(
    roots: &[PackageRef],
    target: &TargetDescriptor,
    branch: &str,
    repo: &str,
    http: &SharedClients,
    cache: &Arc<MetadataCache>,
    common: &CommonOptions,
) -> ResolveOutcome {
    let client = ApkClient::new(http.clone(), cache.clone());
    let max_depth = common.max_depth.unwrap_or(EcosystemKind::Apk.default_max_depth());
    let arch = target.arch.to_string();
    let mut outcome = ResolveOutcome::default();

    for root in roots {
        let Some(repo_base_url) = root.repository.clone() else {
            outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Apk, "ConfigError", "no repository base URL configured"));
            continue;
        };
        let records = match client.get_index(&repo_base_url, branch, repo, &arch).await {
            Ok(r) => r,
            Err(err) => {
                outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Apk, "NetworkFailure", err.to_string()));
                continue;
            }
        };

        let mut provides_index: HashMap<&str, usize> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            provides_index.entry(&record.name).or_insert(i);
            for p in &record.provides {
                provides_index.entry(p.as_str()).or_insert(i);
            }
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((root.name.clone(), 0));

        while let Some((capability, depth)) = queue.pop_front() {
            if depth > max_depth || !visited.insert(capability.clone()) {
                continue;
            }
            let Some(&idx) = provides_index.get(capability.as_str()) else {
                outcome.failures.push(FailureRecord::new(format!("apk:{capability}"), EcosystemKind::Apk, "NotFound", format!("no package provides {capability}")));
                continue;
            };
            let record = &records[idx];
            let artifact = apk_artifact(record, &repo_base_url, branch, repo);
            let package = ResolvedPackage::new(EcosystemKind::Apk, &record.name, &record.version).with_artifact(artifact);
            let id = outcome.graph.add_node(package);
            if depth == 0 {
                outcome.graph.mark_root(id);
            }
            for dep in &record.depends {
                if dep.starts_with('!') {
                    continue; // conflict marker, not a dependency to pull in
                }
                let dep_name = dep.split(' ').next().unwrap_or(dep).to_string();
                queue.push_back((dep_name, depth + 1));
            }
        }
    }

    outcome
}

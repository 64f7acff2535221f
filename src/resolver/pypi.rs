//! PyPI resolver: round-based constraint accumulation over PEP 440
//! specifiers, a simplified stand-in for resolvelib's full backtracking
//! search, per spec §4.5 ("PyPI backtracking a la resolvelib").
//!
//! Each round re-walks the whole dependency tree from the roots, picking
//! for every package the highest version satisfying every specifier seen
//! for it *so far*. A round that changes any package's pick from the
//! previous round means a dependency discovered this round tightened a
//! constraint; the next round re-derives everything against the new,
//! larger constraint set. Converges to a fixed point (the real backtracking
//! families call this "conflict-driven retry") or gives up once
//! `max_backtracks` picks have changed or `max_rounds` is exhausted,
//! whichever comes first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::ecosystem::EcosystemKind;
use crate::models::error::EngineError;
use crate::models::failure::FailureRecord;
use crate::models::options::{CommonOptions, PypiOptions};
use crate::models::package_ref::{normalize_name, PackageRef};
use crate::models::resolved_package::ResolvedPackage;
use crate::models::target::TargetDescriptor;
use crate::registry::http_error_to_engine;
use crate::registry::pypi::{file_to_artifact, PypiClient};
use crate::selector::pypi::select_best_file;
use crate::version::pypi::Pep440;
use crate::version::VersionOrdering;

use super::ResolveOutcome;

#[derive(Debug, Clone)]
struct Requirement {
    spec: String,
    optional: bool,
}

pub async fn resolve(
    roots: &[PackageRef],
    target: &TargetDescriptor,
    http: &SharedClients,
    cache: &Arc<MetadataCache>,
    common: &CommonOptions,
    options: &PypiOptions,
) -> ResolveOutcome {
    let client = PypiClient::new(http.clone(), cache.clone());
    let ordering = Pep440;
    let max_depth = common.max_depth.unwrap_or(EcosystemKind::Pypi.default_max_depth());

    let mut constraints: HashMap<String, Vec<Requirement>> = HashMap::new();
    for root in roots {
        let norm = normalize_name(EcosystemKind::Pypi, &root.name);
        constraints.entry(norm).or_default().push(Requirement {
            spec: root.version_spec.clone(),
            optional: root.optional,
        });
    }

    let mut previous_assignment: HashMap<String, String> = HashMap::new();
    let mut outcome = ResolveOutcome::default();
    let mut backtracks = 0usize;

    for _round in 0..options.max_rounds.max(1) {
        let mut round_outcome = ResolveOutcome::default();
        let mut assignment: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize, Option<String>)> =
            constraints.keys().map(|name| (name.clone(), 0, None)).collect();

        while let Some((name, depth, parent_key)) = queue.pop_front() {
            if depth > max_depth {
                round_outcome.failures.push(FailureRecord::new(
                    format!("pypi:{name}"),
                    EcosystemKind::Pypi,
                    "VersionUnsatisfiable",
                    format!("max depth {max_depth} exceeded resolving {name}"),
                ));
                continue;
            }
            if !visited.insert(name.clone()) {
                continue;
            }

            let requirements = constraints.get(&name).cloned().unwrap_or_default();
            let all_optional = !requirements.is_empty() && requirements.iter().all(|r| r.optional);

            let resolved_version = match pick_version(&client, &ordering, &name, &requirements, common.allow_prerelease).await {
                Ok(v) => v,
                Err(err) => {
                    let mut record = FailureRecord::new(format!("pypi:{name}"), EcosystemKind::Pypi, err.kind_name(), err.to_string());
                    if all_optional {
                        record = record.as_warning();
                    }
                    round_outcome.failures.push(record);
                    continue;
                }
            };
            assignment.insert(name.clone(), resolved_version.clone());

            let metadata = match client.get_metadata(&name, &resolved_version).await {
                Ok(m) => m,
                Err(err) => {
                    round_outcome.failures.push(FailureRecord::new(
                        format!("pypi:{name}"),
                        EcosystemKind::Pypi,
                        "NetworkFailure",
                        err.to_string(),
                    ));
                    continue;
                }
            };

            let Some(file) = select_best_file(&metadata.files, target, options.prefer_binary, options.allow_yanked) else {
                let err = crate::selector::no_compatible_artifact(
                    EcosystemKind::Pypi,
                    &name,
                    &resolved_version,
                    metadata.files.len(),
                    Vec::new(),
                );
                round_outcome.failures.push(FailureRecord::new(format!("pypi:{name}"), EcosystemKind::Pypi, err.kind_name(), err.to_string()));
                continue;
            };

            let artifact = file_to_artifact(file);
            let package = ResolvedPackage::new(EcosystemKind::Pypi, &name, &resolved_version).with_artifact(artifact);
            let id = round_outcome.graph.add_node(package);
            if parent_key.is_none() {
                round_outcome.graph.mark_root(id);
            }

            let child_parent_key = Some(format!("pypi:{name}@{resolved_version}"));
            for raw in &metadata.requires_dist {
                let Some((dep_name, dep_spec, optional)) = parse_requirement(raw) else { continue };
                let dep_norm = normalize_name(EcosystemKind::Pypi, &dep_name);
                constraints.entry(dep_norm.clone()).or_default().push(Requirement {
                    spec: dep_spec,
                    optional,
                });
                queue.push_back((dep_norm, depth + 1, child_parent_key.clone()));
            }
        }

        let changed: Vec<&String> = assignment
            .keys()
            .filter(|k| previous_assignment.get(*k) != assignment.get(*k))
            .collect();
        let change_count = changed.len();
        for name in &changed {
            if let (Some(old), Some(new)) = (previous_assignment.get(*name), assignment.get(*name)) {
                round_outcome.conflicts.push(
                    crate::models::conflict::ConflictRecord::new(
                        format!("pypi:{name}"),
                        new.clone(),
                        crate::models::conflict::ConflictRule::HighestCompatible,
                    )
                    .requested_by("<accumulated>", format!("superseded {old}")),
                );
            }
        }

        outcome = round_outcome;
        if previous_assignment.len() == assignment.len() && change_count == 0 {
            break;
        }
        previous_assignment = assignment;
        backtracks += change_count;
        if backtracks > options.max_backtracks {
            outcome.failures.push(FailureRecord::new(
                "pypi:*",
                EcosystemKind::Pypi,
                "VersionUnsatisfiable",
                format!("backtrack budget of {} exceeded while converging on a compatible set", options.max_backtracks),
            ));
            break;
        }
    }

    outcome
}

async fn pick_version(
    client: &PypiClient,
    ordering: &Pep440,
    name: &str,
    requirements: &[Requirement],
    allow_prerelease: bool,
) -> Result<String, EngineError> {
    let versions = client
        .list_versions(name)
        .await
        .map_err(|e| http_error_to_engine(to_http_error(e), EcosystemKind::Pypi, name, None))?;

    let mut candidates: Vec<&String> = versions
        .iter()
        .filter(|v| allow_prerelease || !crate::version::pypi::is_prerelease(v))
        .filter(|v| requirements.iter().all(|r| r.spec.is_empty() || r.spec == "*" || ordering.satisfies(v, &r.spec)))
        .collect();
    candidates.sort_by(|a, b| ordering.compare(a, b).unwrap_or(std::cmp::Ordering::Equal));

    candidates.last().map(|v| (*v).clone()).ok_or_else(|| EngineError::VersionUnsatisfiable {
        ecosystem: EcosystemKind::Pypi,
        root: name.to_string(),
        reason: format!(
            "no published version of {name} satisfies {}",
            requirements.iter().map(|r| r.spec.as_str()).collect::<Vec<_>>().join(", ")
        ),
    })
}

fn to_http_error(err: crate::registry::pypi::PypiError) -> crate::http::HttpError {
    match err {
        crate::registry::pypi::PypiError::Http(e) => e,
        crate::registry::pypi::PypiError::Parse(_, detail) => crate::http::HttpError::UnexpectedStatus {
            status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            url: detail,
        },
    }
}

/// Parses one `Requires-Dist` entry (PEP 508), simplified the same way the
/// teacher's `pypi_client::convert_to_package` does: the leading token up to
/// whitespace/`[`/`;` is the name, anything with a comparison operator is
/// kept as the version spec verbatim, and an environment marker after `;`
/// is dropped rather than evaluated (this engine has no notion of "current
/// interpreter running pip install", only the resolution target).
fn parse_requirement(raw: &str) -> Option<(String, String, bool)> {
    let without_marker = raw.split(';').next().unwrap_or(raw).trim();
    let optional = raw.contains("extra ==");
    let name_end = without_marker.find(['[', ' ', '(']).unwrap_or(without_marker.len());
    let name = without_marker[..name_end].trim();
    if name.is_empty() {
        return None;
    }
    let rest = without_marker[name_end..].trim();
    let spec = rest.trim_start_matches(|c: char| c == '[' ).find(']').map(|i| rest[i + 1..].trim()).unwrap_or(rest);
    let spec = spec.trim_matches(|c| c == '(' || c == ')').trim();
    Some((name.to_string(), spec.to_string(), optional))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_requirement() {
        let (name, spec, optional) = parse_requirement("requests>=2.28.0,<3.0.0").unwrap();
        assert_eq!(name, "requests");
        assert_eq!(spec, ">=2.28.0,<3.0.0");
        assert!(!optional);
    }

    #[test]
    fn parses_extras_and_marker() {
        let (name, spec, optional) = parse_requirement("pytest (>=6.0) ; extra == 'test'").unwrap();
        assert_eq!(name, "pytest");
        assert_eq!(spec, ">=6.0");
        assert!(optional);
    }

    #[test]
    fn parses_bare_name_with_extras() {
        let (name, spec, _) = parse_requirement("requests[socks]").unwrap();
        assert_eq!(name, "requests");
        assert_eq!(spec, "");
    }
}

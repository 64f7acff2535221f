//! npm resolver: Arborist-style BFS with hoisting, per spec §4.4/§4.5.
//!
//! Placement is tracked per `node_modules` level rather than per bare name:
//! `placements` maps a level path (`""` for the top-level `node_modules`,
//! otherwise `{parent-level}/node_modules/{name}`) to the names occupying
//! that level. Resolving `name@spec` required from a parent placed at level
//! `L` walks the search chain `[L, parent-of-L, ..., ""]` exactly as spec
//! §4.5 describes: `KEEP`/`REPLACE` when a compatible version already
//! occupies a level (approximated here as "reuse on `satisfies`", without
//! re-validating every existing consumer of the level it replaces — a
//! narrowed scope recorded in `DESIGN.md`), `OK` when a level is empty, and
//! `CONFLICT` when every level up to the walk's stopping point is occupied
//! by an incompatible version. On `CONFLICT` under `Hoisted`, the new copy
//! nests at the walk's starting level `L` (spec §4.5: "nest the new copy at
//! `P/node_modules/name`"), giving it a `node_modules_path` distinct from
//! the version already placed higher up — this is what lets the §8
//! npm-placement property (two sibling subtrees pulling `lib@^1` and
//! `lib@^2` each get their own path) hold. `prefer_dedupe` (default `true`)
//! controls how hard the walk tries before nesting: `true` keeps walking
//! past a conflicting level looking for a compatible or empty slot closer
//! to the root; `false` nests immediately at the first conflict, per the
//! `SPEC_FULL.md` Open Question #3 resolution. `Nested`/`Shallow` skip the
//! walk entirely and always place a fresh node at the requester's own
//! level, matching their "always nest" / "a flat tree never shares a slot
//! to begin with" spec descriptions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::conflict::{ConflictRecord, ConflictRule};
use crate::models::ecosystem::EcosystemKind;
use crate::models::error::EngineError;
use crate::models::failure::FailureRecord;
use crate::models::graph::NodeId;
use crate::models::options::{CommonOptions, HoistingStrategy, NpmOptions};
use crate::models::package_ref::PackageRef;
use crate::models::resolved_package::ResolvedPackage;
use crate::registry::http_error_to_engine;
use crate::registry::npm::{dist_to_artifact, NpmClient};
use crate::version::npm::NpmSemver;
use crate::version::VersionOrdering;

use super::ResolveOutcome;

/// One entry in the npm BFS queue. Unlike the shared [`super::QueueItem`],
/// every item also carries its placement search chain — the ordered list of
/// `node_modules` levels to try, nearest first, always ending in `""` (the
/// top-level `node_modules`).
#[derive(Debug, Clone)]
struct NpmQueueItem {
    name: String,
    version_spec: String,
    depth: usize,
    parent_key: Option<String>,
    optional: bool,
    search_levels: Vec<String>,
}

/// Where a `(name, version)` is placed at a given `node_modules` level.
type Placements = HashMap<String, HashMap<String, (String, NodeId)>>;

enum Placement {
    /// A compatible version already occupies a level on the search chain;
    /// reuse it and emit no new node.
    Keep(NodeId),
    /// Place a fresh node at `level`. `conflicted_with`, if set, is the
    /// incompatible version that blocked reuse somewhere on the walk —
    /// used to emit a `ConflictRecord` even though the outcome is a nest
    /// rather than a hard failure (invariant iv: conflicts are recorded,
    /// not hidden, even when the resolver successfully works around them).
    New { level: String, conflicted_with: Option<String> },
}

/// The `node_modules` path a package placed at `level` would occupy.
fn node_modules_path(level: &str, name: &str) -> String {
    if level.is_empty() {
        format!("node_modules/{name}")
    } else {
        format!("{level}/node_modules/{name}")
    }
}

/// The search chain a newly-placed node's own dependencies start from: its
/// own level first, then whatever of the parent's chain lies at or above
/// the level the parent search stopped at (the placed level and every
/// ancestor above it are still valid hoist targets for the child).
fn child_search_levels(parent_search_levels: &[String], placed_level: &str, own_level: &str) -> Vec<String> {
    let idx = parent_search_levels.iter().position(|l| l == placed_level).unwrap_or(parent_search_levels.len().saturating_sub(1));
    let mut levels = vec![own_level.to_string()];
    levels.extend(parent_search_levels[idx..].iter().cloned());
    levels
}

/// Walks `search_levels` nearest-first (the requester's own level first,
/// the top-level `node_modules` last), climbing through empty levels toward
/// the root the way a real hoist does, per spec §4.5. A level already
/// holding a compatible version is a `KEEP` (stop climbing, reuse it). A
/// level already holding an incompatible version is a `CONFLICT`: climbing
/// past it would leave the requester silently resolving to that
/// incompatible entry first (it is nearer to the requester than anything
/// beyond it), so the walk must stop there and land at the best still-safe
/// level already passed — `prefer_dedupe=true` uses that best empty level
/// (the usual hoist-as-high-as-still-correct outcome); `prefer_dedupe=false`
/// ignores it and nests right at the requester's own level, per
/// `SPEC_FULL.md` Open Question #3 ("nests on any conflict").
fn decide_placement(
    placements: &Placements,
    name: &str,
    resolved_version: &str,
    version_spec: &str,
    search_levels: &[String],
    ordering: &NpmSemver,
    prefer_dedupe: bool,
) -> Placement {
    let mut best_open_level: Option<String> = None;
    for level in search_levels {
        match placements.get(level).and_then(|m| m.get(name)) {
            None => best_open_level = Some(level.clone()),
            Some((existing_version, existing_id)) => {
                if existing_version == resolved_version || ordering.satisfies(existing_version, version_spec) {
                    return Placement::Keep(*existing_id);
                }
                let landing = if prefer_dedupe {
                    best_open_level.unwrap_or_else(|| search_levels[0].clone())
                } else {
                    search_levels[0].clone()
                };
                return Placement::New { level: landing, conflicted_with: Some(existing_version.clone()) };
            }
        }
    }
    Placement::New { level: best_open_level.unwrap_or_else(|| search_levels[0].clone()), conflicted_with: None }
}

pub async fn resolve(
    roots: &[PackageRef],
    http: &SharedClients,
    cache: &Arc<MetadataCache>,
    common: &CommonOptions,
    options: &NpmOptions,
) -> ResolveOutcome {
    let client = NpmClient::new(http.clone(), cache.clone());
    let ordering = NpmSemver;
    let max_depth = common.max_depth.unwrap_or(EcosystemKind::Npm.default_max_depth());

    let mut outcome = ResolveOutcome::default();
    let mut placements: Placements = HashMap::new();
    let mut visited_edges: HashSet<(String, String)> = HashSet::new();
    let mut queue: VecDeque<NpmQueueItem> = roots
        .iter()
        .map(|r| NpmQueueItem {
            name: r.name.clone(),
            version_spec: r.version_spec.clone(),
            depth: 0,
            parent_key: None,
            optional: r.optional,
            search_levels: vec![String::new()],
        })
        .collect();

    while let Some(item) = queue.pop_front() {
        if item.depth > max_depth {
            outcome.failures.push(
                FailureRecord::new(
                    format!("npm:{}", item.name),
                    EcosystemKind::Npm,
                    "VersionUnsatisfiable",
                    format!("max depth {max_depth} exceeded resolving {}", item.name),
                )
                .as_warning(),
            );
            continue;
        }

        let edge_key = (item.parent_key.clone().unwrap_or_default(), item.name.clone());
        if !visited_edges.insert(edge_key) {
            continue;
        }

        let resolved_version = match resolve_version(&client, &ordering, &item, common.allow_prerelease).await {
            Ok(v) => v,
            Err(err) => {
                push_failure(&mut outcome, &item, err);
                continue;
            }
        };

        let placement = if options.hoisting == HoistingStrategy::Hoisted {
            decide_placement(&placements, &item.name, &resolved_version, &item.version_spec, &item.search_levels, &ordering, options.prefer_dedupe)
        } else {
            // `Nested`/`Shallow`: always a fresh node at the requester's own
            // level, never reused across siblings.
            Placement::New { level: item.search_levels[0].clone(), conflicted_with: None }
        };

        let (level, conflicted_with) = match placement {
            Placement::Keep(_) => continue,
            Placement::New { level, conflicted_with } => (level, conflicted_with),
        };

        if let Some(existing_version) = conflicted_with {
            outcome.conflicts.push(
                ConflictRecord::new(format!("npm:{}", item.name), resolved_version.clone(), ConflictRule::NearestWins)
                    .requested_by(item.parent_key.clone().unwrap_or_else(|| "<root>".to_string()), item.version_spec.clone())
                    .requested_by("<existing>", existing_version),
            );
        }

        let version_info = match client.get_version(&item.name, &resolved_version).await {
            Ok(v) => v,
            Err(err) => {
                push_failure(&mut outcome, &item, http_error_to_engine(to_http_error(err), EcosystemKind::Npm, &item.name, Some(&resolved_version)));
                continue;
            }
        };
        let artifact = dist_to_artifact(&version_info);
        let own_level = node_modules_path(&level, &item.name);
        let package = ResolvedPackage::new(EcosystemKind::Npm, &item.name, &resolved_version)
            .with_artifact(artifact)
            .with_node_modules_path(own_level.clone());
        let id = outcome.graph.add_node(package);
        if item.parent_key.is_none() {
            outcome.graph.mark_root(id);
        }
        placements.entry(level.clone()).or_default().insert(item.name.clone(), (resolved_version.clone(), id));

        let child_levels = child_search_levels(&item.search_levels, &level, &own_level);
        enqueue_dependencies(&version_info, &item, &resolved_version, options, max_depth, &child_levels, &mut queue);
    }

    outcome
}

async fn resolve_version(
    client: &NpmClient,
    ordering: &NpmSemver,
    item: &NpmQueueItem,
    allow_prerelease: bool,
) -> Result<String, EngineError> {
    let versions = client
        .list_versions(&item.name)
        .await
        .map_err(|e| http_error_to_engine(to_http_error(e), EcosystemKind::Npm, &item.name, None))?;

    let mut candidates: Vec<&String> = versions
        .iter()
        .filter(|v| allow_prerelease || !crate::version::npm::is_prerelease(v))
        .filter(|v| ordering.satisfies(v, &item.version_spec))
        .collect();
    candidates.sort_by(|a, b| ordering.compare(a, b).unwrap_or(std::cmp::Ordering::Equal));

    candidates
        .last()
        .map(|v| (*v).clone())
        .ok_or_else(|| EngineError::VersionUnsatisfiable {
            ecosystem: EcosystemKind::Npm,
            root: item.name.clone(),
            reason: format!("no published version satisfies {}", item.version_spec),
        })
}

fn enqueue_dependencies(
    version_info: &crate::registry::npm::NpmVersionInfo,
    item: &NpmQueueItem,
    resolved_version: &str,
    options: &NpmOptions,
    max_depth: usize,
    child_levels: &[String],
    queue: &mut VecDeque<NpmQueueItem>,
) {
    let parent_key = Some(format!("npm:{}@{resolved_version}", item.name));
    if item.depth + 1 > max_depth {
        return;
    }

    for (name, spec) in &version_info.dependencies {
        queue.push_back(NpmQueueItem {
            name: name.clone(),
            version_spec: spec.clone(),
            depth: item.depth + 1,
            parent_key: parent_key.clone(),
            optional: false,
            search_levels: child_levels.to_vec(),
        });
    }

    if options.install_peers {
        for (name, spec) in &version_info.peer_dependencies {
            let optional = version_info.peer_dependencies_meta.get(name).map(|m| m.optional).unwrap_or(false);
            queue.push_back(NpmQueueItem {
                name: name.clone(),
                version_spec: spec.clone(),
                depth: item.depth + 1,
                parent_key: parent_key.clone(),
                optional,
                search_levels: child_levels.to_vec(),
            });
        }
    }

    for (name, spec) in &version_info.optional_dependencies {
        queue.push_back(NpmQueueItem {
            name: name.clone(),
            version_spec: spec.clone(),
            depth: item.depth + 1,
            parent_key: parent_key.clone(),
            optional: true,
            search_levels: child_levels.to_vec(),
        });
    }
}

fn push_failure(outcome: &mut ResolveOutcome, item: &NpmQueueItem, err: EngineError) {
    let mut record = FailureRecord::new(format!("npm:{}", item.name), EcosystemKind::Npm, err.kind_name(), err.to_string());
    if item.optional {
        record = record.as_warning();
    }
    outcome.failures.push(record);
}

fn to_http_error(err: crate::registry::npm::NpmError) -> crate::http::HttpError {
    match err {
        crate::registry::npm::NpmError::Http(e) => e,
        crate::registry::npm::NpmError::Parse(detail) => crate::http::HttpError::UnexpectedStatus {
            status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            url: detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> NodeId {
        NodeId(name.bytes().map(u32::from).sum())
    }

    #[test]
    fn node_modules_path_is_flat_at_root() {
        assert_eq!(node_modules_path("", "lib"), "node_modules/lib");
    }

    #[test]
    fn node_modules_path_nests_under_a_parent_level() {
        assert_eq!(node_modules_path("node_modules/plugin", "host"), "node_modules/plugin/node_modules/host");
    }

    #[test]
    fn an_empty_root_level_places_the_first_request_there() {
        let placements = Placements::new();
        let placement = decide_placement(&placements, "lib", "1.2.0", "^1.0.0", &[String::new()], &NpmSemver, true);
        assert!(matches!(placement, Placement::New { level, conflicted_with: None } if level.is_empty()));
    }

    #[test]
    fn a_compatible_existing_root_version_is_kept() {
        let mut placements = Placements::new();
        placements.entry(String::new()).or_default().insert("lib".to_string(), ("1.4.0".to_string(), node("lib")));
        let placement = decide_placement(&placements, "lib", "1.4.0", "^1.0.0", &[String::new()], &NpmSemver, true);
        assert!(matches!(placement, Placement::Keep(_)));
    }

    #[test]
    fn an_incompatible_root_version_nests_under_hoisted_with_prefer_dedupe_off() {
        let mut placements = Placements::new();
        placements.entry(String::new()).or_default().insert("lib".to_string(), ("1.0.0".to_string(), node("lib")));
        let search_levels = vec!["node_modules/plugin".to_string(), String::new()];
        let placement = decide_placement(&placements, "lib", "2.0.0", "^2.0.0", &search_levels, &NpmSemver, false);
        match placement {
            Placement::New { level, conflicted_with } => {
                assert_eq!(level, "node_modules/plugin");
                assert_eq!(conflicted_with, Some("1.0.0".to_string()));
            }
            Placement::Keep(_) => panic!("expected a nested placement, not a reuse"),
        }
    }

    #[test]
    fn prefer_dedupe_climbs_through_empty_levels_but_stops_below_a_conflict() {
        // Consumer at "node_modules/sibling", one empty ancestor bucket
        // ("node_modules/root") between it and a root ("") already holding
        // an incompatible version. The climb may pass through the empty
        // ancestor (still safe — nothing nearer to the consumer shadows it)
        // but must not land at or beyond the conflicting root level.
        let mut placements = Placements::new();
        placements.entry(String::new()).or_default().insert("lib".to_string(), ("1.0.0".to_string(), node("lib")));
        let search_levels = vec!["node_modules/sibling".to_string(), "node_modules/root".to_string(), String::new()];
        let placement = decide_placement(&placements, "lib", "2.0.0", "^2.0.0", &search_levels, &NpmSemver, true);
        match placement {
            Placement::New { level, conflicted_with } => {
                assert_eq!(level, "node_modules/root");
                assert_eq!(conflicted_with, Some("1.0.0".to_string()));
            }
            Placement::Keep(_) => panic!("expected a fresh placement below the conflicting root entry"),
        }
    }

    #[test]
    fn prefer_dedupe_off_ignores_any_open_ancestor_and_nests_at_the_requester() {
        let mut placements = Placements::new();
        placements.entry(String::new()).or_default().insert("lib".to_string(), ("1.0.0".to_string(), node("lib")));
        let search_levels = vec!["node_modules/sibling".to_string(), "node_modules/root".to_string(), String::new()];
        let placement = decide_placement(&placements, "lib", "2.0.0", "^2.0.0", &search_levels, &NpmSemver, false);
        match placement {
            Placement::New { level, conflicted_with } => {
                assert_eq!(level, "node_modules/sibling");
                assert_eq!(conflicted_with, Some("1.0.0".to_string()));
            }
            Placement::Keep(_) => panic!("expected a fresh placement at the requester's own level"),
        }
    }

    #[test]
    fn child_search_levels_keeps_the_placed_level_and_everything_above_it() {
        let parent_levels = vec!["node_modules/a/node_modules/b".to_string(), "node_modules/a".to_string(), String::new()];
        let child_levels = child_search_levels(&parent_levels, "node_modules/a", "node_modules/a/node_modules/lib");
        assert_eq!(
            child_levels,
            vec!["node_modules/a/node_modules/lib".to_string(), "node_modules/a".to_string(), String::new()]
        );
    }
}

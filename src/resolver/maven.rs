//! Maven resolver: BFS nearest-wins over the POM graph, per spec §4.4
//! ("the shallowest declared version wins; depth ties break by first
//! declaration order") plus a `dependencyManagement`/BOM override pass
//! per §4.2.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::conflict::{ConflictRecord, ConflictRule};
use crate::models::ecosystem::EcosystemKind;
use crate::models::error::EngineError;
use crate::models::failure::FailureRecord;
use crate::models::options::CommonOptions;
use crate::models::package_ref::PackageRef;
use crate::models::resolved_package::ResolvedPackage;
use crate::registry::maven::{jar_artifact, MavenClient, Pom};

use super::{QueueItem, ResolveOutcome};

const EXCLUDED_SCOPES: &[&str] = &["test", "provided", "system"];

/// What to do with a queue item once its shallowest-depth-wins bookkeeping
/// key is known, per spec §4.4/§8 invariant (iv) ("conflicts are recorded,
/// not hidden").
enum DepthDecision {
    /// First time this key is seen; it becomes the permanent winner.
    NewWinner,
    /// A strictly deeper duplicate request; the existing winner is
    /// untouched but the attempt is recorded.
    Deeper(ConflictRecord),
    /// Same depth as the existing winner. `Some` when the requested
    /// version differs from the winner's (two equally-near requesters
    /// disagreeing, spec §8 scenario 3); `None` when it matches.
    SameDepth(Option<ConflictRecord>),
}

#[allow(clippy::too_many_arguments)]
fn decide_depth(
    key: &str,
    item_depth: usize,
    item_parent_key: &Option<String>,
    item_version_spec: &str,
    winning_depth: Option<usize>,
    winning_version: Option<&str>,
    winning_parent: Option<&Option<String>>,
) -> DepthDecision {
    let requester = |parent: &Option<String>| parent.clone().unwrap_or_else(|| "<root>".to_string());

    match winning_depth {
        None => DepthDecision::NewWinner,
        Some(best_depth) if item_depth > best_depth => DepthDecision::Deeper(
            ConflictRecord::new(format!("maven:{key}"), item_version_spec.to_string(), ConflictRule::NearestWins)
                .requested_by(requester(item_parent_key), item_version_spec.to_string()),
        ),
        Some(_) => {
            let record = match winning_version {
                Some(winner_version) if winner_version != item_version_spec => {
                    let winner_parent = winning_parent.cloned().flatten();
                    Some(
                        ConflictRecord::new(format!("maven:{key}"), winner_version.to_string(), ConflictRule::NearestWins)
                            .requested_by(requester(&winner_parent), winner_version.to_string())
                            .requested_by(requester(item_parent_key), item_version_spec.to_string()),
                    )
                }
                _ => None,
            };
            DepthDecision::SameDepth(record)
        }
    }
}

pub async fn resolve(roots: &[PackageRef], http: &SharedClients, cache: &Arc<MetadataCache>, common: &CommonOptions) -> ResolveOutcome {
    let client = MavenClient::new(http.clone(), cache.clone());
    let max_depth = common.max_depth.unwrap_or(EcosystemKind::Maven.default_max_depth());

    let mut outcome = ResolveOutcome::default();
    // Shallowest-depth-wins bookkeeping: first time a (groupId, artifactId)
    // is scheduled at a given depth, that depth becomes its permanent
    // winner regardless of what later, deeper paths request. `winning_version`/
    // `winning_parent` remember the first requester at that winning depth so a
    // later sibling requesting a different version at the *same* depth can
    // still be recorded as a conflict against it (spec §8 scenario 3).
    let mut winning_depth: HashMap<String, usize> = HashMap::new();
    let mut winning_version: HashMap<String, String> = HashMap::new();
    let mut winning_parent: HashMap<String, Option<String>> = HashMap::new();
    let mut added: HashSet<String> = HashSet::new();

    let mut queue: VecDeque<QueueItem> = roots
        .iter()
        .map(|r| QueueItem {
            name: r.name.clone(),
            version_spec: r.version_spec.clone(),
            depth: 0,
            parent_key: None,
            optional: r.optional,
        })
        .collect();

    while let Some(item) = queue.pop_front() {
        if item.depth > max_depth {
            continue;
        }
        let Some((group_id, artifact_id)) = item.name.split_once(':') else {
            outcome.failures.push(FailureRecord::new(
                item.name.clone(),
                EcosystemKind::Maven,
                "ConfigError",
                "maven package name must be groupId:artifactId".to_string(),
            ));
            continue;
        };
        let key = format!("{group_id}:{artifact_id}");

        let decision = decide_depth(
            &key,
            item.depth,
            &item.parent_key,
            &item.version_spec,
            winning_depth.get(&key).copied(),
            winning_version.get(&key).map(String::as_str),
            winning_parent.get(&key),
        );
        match decision {
            DepthDecision::Deeper(record) => {
                outcome.conflicts.push(record);
                continue;
            }
            DepthDecision::SameDepth(record) => {
                if let Some(record) = record {
                    outcome.conflicts.push(record);
                }
                continue;
            }
            DepthDecision::NewWinner => {
                winning_depth.insert(key.clone(), item.depth);
                winning_version.insert(key.clone(), item.version_spec.clone());
                winning_parent.insert(key.clone(), item.parent_key.clone());
            }
        }

        if !added.insert(key.clone()) {
            continue;
        }

        let version = item.version_spec.clone();
        let pom = match client.get_pom(group_id, artifact_id, &version).await {
            Ok(pom) => pom,
            Err(err) => {
                outcome.failures.push(failure_for(&item, &key, err));
                continue;
            }
        };

        let managed = match client.resolve_dependency_management(&pom, max_depth.saturating_sub(item.depth)).await {
            Ok(m) => m,
            Err(_) => HashMap::new(),
        };

        let artifact = jar_artifact("https://repo1.maven.org/maven2", group_id, artifact_id, &version, None);
        let package = ResolvedPackage::new(EcosystemKind::Maven, &key, &version).with_artifact(artifact);
        let id = outcome.graph.add_node(package);
        if item.parent_key.is_none() {
            outcome.graph.mark_root(id);
        }

        enqueue_children(&pom, &managed, &item, max_depth, &mut queue);
    }

    outcome
}

fn enqueue_children(pom: &Pom, managed: &HashMap<(String, String), String>, parent: &QueueItem, max_depth: usize, queue: &mut VecDeque<QueueItem>) {
    if parent.depth + 1 > max_depth {
        return;
    }
    let parent_key = Some(format!("{}@{}", parent.name, parent.version_spec));
    for dep in &pom.dependencies.dependency {
        if let Some(scope) = &dep.scope {
            if EXCLUDED_SCOPES.contains(&scope.as_str()) {
                continue;
            }
        }
        let optional = dep.optional.as_deref() == Some("true");
        let version = dep
            .version
            .clone()
            .or_else(|| managed.get(&(dep.group_id.clone(), dep.artifact_id.clone())).cloned());
        let Some(version) = version else { continue };
        queue.push_back(QueueItem {
            name: format!("{}:{}", dep.group_id, dep.artifact_id),
            version_spec: version,
            depth: parent.depth + 1,
            parent_key: parent_key.clone(),
            optional,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::maven::{Pom, PomDependencies, PomDependency};

    fn dep(group_id: &str, artifact_id: &str, version: Option<&str>, scope: Option<&str>) -> PomDependency {
        PomDependency {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.map(str::to_string),
            scope: scope.map(str::to_string),
            optional: None,
            exclusions: None,
        }
    }

    fn root_item() -> QueueItem {
        QueueItem { name: "com.example:parent".to_string(), version_spec: "1.0".to_string(), depth: 0, parent_key: None, optional: false }
    }

    #[test]
    fn excluded_scopes_are_not_enqueued() {
        let pom = Pom {
            dependencies: PomDependencies {
                dependency: vec![
                    dep("junit", "junit", Some("4.13"), Some("test")),
                    dep("com.example", "runtime-lib", Some("2.0"), Some("provided")),
                    dep("com.example", "compile-lib", Some("1.0"), None),
                ],
            },
            ..Pom::default()
        };
        let mut queue = VecDeque::new();
        enqueue_children(&pom, &HashMap::new(), &root_item(), 10, &mut queue);
        let names: Vec<String> = queue.iter().map(|q| q.name.clone()).collect();
        assert_eq!(names, vec!["com.example:compile-lib"]);
    }

    #[test]
    fn a_dependency_with_no_explicit_version_falls_back_to_dependency_management() {
        let pom = Pom {
            dependencies: PomDependencies { dependency: vec![dep("com.fasterxml.jackson.core", "jackson-databind", None, None)] },
            ..Pom::default()
        };
        let mut managed = HashMap::new();
        managed.insert(("com.fasterxml.jackson.core".to_string(), "jackson-databind".to_string()), "2.15.2".to_string());
        let mut queue = VecDeque::new();
        enqueue_children(&pom, &managed, &root_item(), 10, &mut queue);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].version_spec, "2.15.2");
    }

    #[test]
    fn a_dependency_with_no_version_and_no_management_entry_is_dropped() {
        let pom = Pom {
            dependencies: PomDependencies { dependency: vec![dep("com.example", "unmanaged", None, None)] },
            ..Pom::default()
        };
        let mut queue = VecDeque::new();
        enqueue_children(&pom, &HashMap::new(), &root_item(), 10, &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn children_beyond_max_depth_are_not_enqueued() {
        let pom = Pom {
            dependencies: PomDependencies { dependency: vec![dep("com.example", "too-deep", Some("1.0"), None)] },
            ..Pom::default()
        };
        let deep_parent = QueueItem { depth: 10, ..root_item() };
        let mut queue = VecDeque::new();
        enqueue_children(&pom, &HashMap::new(), &deep_parent, 10, &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn a_never_before_seen_key_is_a_new_winner() {
        let decision = decide_depth("com.example:x", 1, &Some("b".to_string()), "2.0", None, None, None);
        assert!(matches!(decision, DepthDecision::NewWinner));
    }

    #[test]
    fn a_strictly_deeper_duplicate_is_recorded_as_a_conflict_and_does_not_win() {
        let decision = decide_depth(
            "com.example:x",
            2,
            &Some("c".to_string()),
            "3.0",
            Some(1),
            Some("2.0"),
            Some(&Some("b".to_string())),
        );
        match decision {
            DepthDecision::Deeper(record) => {
                assert_eq!(record.chosen_version, "3.0");
                assert_eq!(record.requested_specs.len(), 1);
                assert_eq!(record.requested_specs[0].requester, "c");
            }
            _ => panic!("expected a Deeper conflict"),
        }
    }

    #[test]
    fn two_requesters_at_equal_depth_with_matching_versions_record_nothing() {
        // Spec §8 scenario 3's sibling case, but with agreeing versions:
        // nothing to record, the second request just confirms the winner.
        let decision = decide_depth(
            "com.example:x",
            1,
            &Some("c".to_string()),
            "2.0",
            Some(1),
            Some("2.0"),
            Some(&Some("b".to_string())),
        );
        assert!(matches!(decision, DepthDecision::SameDepth(None)));
    }

    #[test]
    fn two_requesters_at_equal_depth_with_different_versions_records_both() {
        // Root -> B:1.0, C:1.0; B -> X:2.0, C -> X:1.0, both X at depth 2.
        let decision = decide_depth(
            "com.example:x",
            2,
            &Some("com.example:c@1.0".to_string()),
            "1.0",
            Some(2),
            Some("2.0"),
            Some(&Some("com.example:b@1.0".to_string())),
        );
        match decision {
            DepthDecision::SameDepth(Some(record)) => {
                assert_eq!(record.chosen_version, "2.0");
                assert_eq!(record.requested_specs.len(), 2);
                assert_eq!(record.requested_specs[0].requester, "com.example:b@1.0");
                assert_eq!(record.requested_specs[0].version_spec, "2.0");
                assert_eq!(record.requested_specs[1].requester, "com.example:c@1.0");
                assert_eq!(record.requested_specs[1].version_spec, "1.0");
            }
            _ => panic!("expected a SameDepth conflict listing both requesters"),
        }
    }

    #[test]
    fn a_root_level_winner_with_no_parent_key_reports_as_root() {
        let decision = decide_depth("com.example:x", 0, &None, "1.0", None, None, None);
        assert!(matches!(decision, DepthDecision::NewWinner));
    }
}

fn failure_for(item: &QueueItem, key: &str, err: crate::registry::maven::MavenError) -> FailureRecord {
    let engine_err = match err {
        crate::registry::maven::MavenError::Http(e) => crate::registry::http_error_to_engine(e, EcosystemKind::Maven, key, Some(&item.version_spec)),
        crate::registry::maven::MavenError::Parse(detail) => EngineError::ProtocolError {
            ecosystem: EcosystemKind::Maven,
            document_kind: "pom.xml".to_string(),
            name: key.to_string(),
            detail,
        },
    };
    let mut record = FailureRecord::new(format!("maven:{key}"), EcosystemKind::Maven, engine_err.kind_name(), engine_err.to_string());
    if item.optional {
        record = record.as_warning();
    }
    record
}

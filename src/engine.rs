//! Ecosystem Router + top-level Engine, per spec §2/§4.5/§6: dispatches a
//! batch of [`PackageRef`]s to the right per-ecosystem resolver, merges
//! their independent graphs into one combined [`DependencyGraph`], selects
//! and hands the flattened artifact list to the [`crate::scheduler`], and
//! returns the `{graph, flat, conflicts, failures}` result the bundle
//! emitter (out of scope, per spec §1) consumes.
//!
//! Grounded in the teacher's `services::dependency_resolver` top-level
//! entry point, generalized from two hardcoded ecosystems into one router
//! over all eight, per the §9 redesign flag ("one long-lived shared client
//! per (ecosystem, endpoint) inside a process ... construct once at engine
//! creation, hold as fields of an engine value, pass explicitly").

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::conflict::ConflictRecord;
use crate::models::ecosystem::EcosystemKind;
use crate::models::failure::FailureRecord;
use crate::models::graph::DependencyGraph;
use crate::models::options::EngineOptions;
use crate::models::package_ref::PackageRef;
use crate::models::resolved_package::ResolvedPackage;
use crate::models::target::TargetDescriptor;
use crate::scheduler::{self, DownloadOutcome, ProgressEvent};

const DEFAULT_APT_SUITE: &str = "stable";
const DEFAULT_APT_COMPONENT: &str = "main";
const DEFAULT_APK_BRANCH: &str = "v3.19";
const DEFAULT_APK_REPO: &str = "main";

/// Everything the engine produced for one `run` call, per spec §6 Outputs.
#[derive(Debug, Clone, Default)]
pub struct EngineResult {
    pub graph: DependencyGraph,
    pub flat: Vec<ResolvedPackage>,
    pub conflicts: Vec<ConflictRecord>,
    pub failures: Vec<FailureRecord>,
    pub downloaded: Vec<ResolvedPackage>,
    pub total_bytes: u64,
}

/// The engine owns one [`SharedClients`] (pooled HTTP) and one
/// [`MetadataCache`] for the lifetime of the process, passed by reference
/// into every resolver/registry client call rather than re-constructed per
/// request — the §9 "eight singletons" redesign flag resolved.
pub struct Engine {
    http: SharedClients,
    cache: Arc<MetadataCache>,
}

impl Engine {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            http: SharedClients::new(),
            cache: Arc::new(MetadataCache::new(cache_dir)),
        }
    }

    /// Resolves every `PackageRef`, grouped by ecosystem, into one combined
    /// `DependencyGraph`. Independent ecosystems' resolvers run
    /// concurrently (spec §5: "concurrent resolvers for distinct root
    /// requests make progress in parallel").
    pub async fn resolve(&self, refs: &[PackageRef], target: &TargetDescriptor, options: &EngineOptions) -> EngineResult {
        let mut by_kind: std::collections::HashMap<EcosystemKind, Vec<PackageRef>> = std::collections::HashMap::new();
        for r in refs {
            by_kind.entry(r.kind).or_default().push(r.clone());
        }

        let mut futures = Vec::new();
        for (kind, group) in by_kind {
            let target = target.clone();
            let http = self.http.clone();
            let cache = self.cache.clone();
            let options = options.clone();
            futures.push(async move { dispatch(kind, group, &target, &http, &cache, &options).await });
        }

        let outcomes = futures_util::future::join_all(futures).await;

        let mut result = EngineResult::default();
        for outcome in outcomes {
            result.graph.merge(outcome.graph);
            result.conflicts.extend(outcome.conflicts);
            result.failures.extend(outcome.failures);
        }
        result.flat = result.graph.flatten();
        result
    }

    /// Full pipeline: resolve, then hand the flattened artifact list to the
    /// download scheduler, per spec §2's pipeline diagram.
    pub async fn run(
        &self,
        refs: &[PackageRef],
        target: &TargetDescriptor,
        options: &EngineOptions,
        progress: Option<mpsc::Sender<ProgressEvent>>,
        cancellation: CancellationToken,
    ) -> std::io::Result<EngineResult> {
        let mut result = self.resolve(refs, target, options).await;

        let downloadable: Vec<ResolvedPackage> = result.flat.iter().filter(|p| p.artifact.is_some()).cloned().collect();
        let DownloadOutcome { succeeded, failed, total_bytes } = scheduler::download(
            downloadable,
            &options.common.output_dir,
            options.common.concurrency,
            &self.http,
            progress,
            cancellation,
        )
        .await?;

        result.downloaded = succeeded;
        result.failures.extend(failed);
        result.total_bytes = total_bytes;
        Ok(result)
    }
}

/// Default progress-channel capacity exposed for callers building their own
/// channel, matching [`scheduler`]'s drop-oldest-for-progress contract.
pub const PROGRESS_CHANNEL_CAPACITY: usize = crate::scheduler::PROGRESS_CHANNEL_CAPACITY;

async fn dispatch(
    kind: EcosystemKind,
    refs: Vec<PackageRef>,
    target: &TargetDescriptor,
    http: &SharedClients,
    cache: &Arc<MetadataCache>,
    options: &EngineOptions,
) -> crate::resolver::ResolveOutcome {
    match kind {
        EcosystemKind::Pypi => crate::resolver::pypi::resolve(&refs, target, http, cache, &options.common, &options.pypi).await,
        EcosystemKind::Conda => crate::resolver::conda::resolve(&refs, target, http, cache, &options.common).await,
        EcosystemKind::Npm => crate::resolver::npm::resolve(&refs, http, cache, &options.common, &options.npm).await,
        EcosystemKind::Maven => crate::resolver::maven::resolve(&refs, http, cache, &options.common).await,
        EcosystemKind::Oci => crate::resolver::oci::resolve(&refs, target, http, cache).await,
        EcosystemKind::Yum => crate::resolver::os_pkg::resolve_yum(&refs, target, http, cache, &options.common).await,
        EcosystemKind::Apt => {
            // `PackageRef` has no dedicated suite/component fields; the
            // router reuses `channel` for the dist suite and `classifier`
            // for the component, matching the conventions `channel`
            // already carries for conda (per SPEC_FULL.md's decision to
            // keep the data model's field count stable across ecosystems
            // rather than add APT-only fields for this alone).
            let suite = refs.first().and_then(|r| r.channel.clone()).unwrap_or_else(|| DEFAULT_APT_SUITE.to_string());
            let component = refs.first().and_then(|r| r.classifier.clone()).unwrap_or_else(|| DEFAULT_APT_COMPONENT.to_string());
            crate::resolver::os_pkg::resolve_apt(&refs, target, &suite, &component, http, cache, &options.common).await
        }
        EcosystemKind::Apk => {
            let branch = refs.first().and_then(|r| r.channel.clone()).unwrap_or_else(|| DEFAULT_APK_BRANCH.to_string());
            let repo = refs.first().and_then(|r| r.classifier.clone()).unwrap_or_else(|| DEFAULT_APK_REPO.to_string());
            crate::resolver::os_pkg::resolve_apk(&refs, target, &branch, &repo, http, cache, &options.common).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::target::{Arch, Os};

    #[tokio::test]
    async fn resolving_an_empty_ref_list_yields_an_empty_result() {
        let engine = Engine::new(None);
        let target = TargetDescriptor::new(Os::Linux, Arch::X86_64);
        let result = engine.resolve(&[], &target, &EngineOptions::default()).await;
        assert!(result.graph.is_empty());
        assert!(result.flat.is_empty());
        assert!(result.failures.is_empty());
    }
}

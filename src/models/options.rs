use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upgrade preference when a version range admits more than one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpgradeStrategy {
    /// Pick the highest version compatible with the accumulated constraints.
    Eager,
    /// Keep the lowest version compatible with the accumulated constraints.
    Conservative,
}

impl Default for UpgradeStrategy {
    fn default() -> Self {
        UpgradeStrategy::Eager
    }
}

/// Typed replacement for the teacher's `Record<string, unknown>`-style
/// option bags, per the §9 redesign flag ("dynamic option bags ... replace
/// with a typed options record per ecosystem, composed from a shared
/// CommonOptions").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    pub common: CommonOptions,
    pub npm: NpmOptions,
    pub pypi: PypiOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            npm: NpmOptions::default(),
            pypi: PypiOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonOptions {
    pub max_depth: Option<usize>,
    pub include_dev: bool,
    pub include_optional: bool,
    pub allow_prerelease: bool,
    pub upgrade_strategy: UpgradeStrategy,
    pub concurrency: usize,
    pub output_dir: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl_ms: Option<u64>,
    pub force_refresh: bool,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            include_dev: false,
            include_optional: false,
            allow_prerelease: false,
            upgrade_strategy: UpgradeStrategy::default(),
            concurrency: 6,
            output_dir: PathBuf::from("./polypm-bundle"),
            cache_dir: None,
            cache_ttl_ms: None,
            force_refresh: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpmOptions {
    pub install_peers: bool,
    pub legacy_peer_deps: bool,
    pub prefer_dedupe: bool,
    pub hoisting: HoistingStrategy,
}

impl Default for NpmOptions {
    fn default() -> Self {
        Self {
            install_peers: true,
            legacy_peer_deps: false,
            prefer_dedupe: true,
            hoisting: HoistingStrategy::Hoisted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HoistingStrategy {
    Hoisted,
    Nested,
    Shallow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PypiOptions {
    pub prefer_binary: bool,
    pub allow_yanked: bool,
    pub max_backtracks: usize,
    pub max_rounds: usize,
}

impl Default for PypiOptions {
    fn default() -> Self {
        Self {
            prefer_binary: true,
            allow_yanked: false,
            max_backtracks: 1000,
            max_rounds: 2000,
        }
    }
}

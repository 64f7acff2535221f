//! Candidate selectors: given a registry's raw file listing and a
//! `TargetDescriptor`, pick the single best-matching artifact, per spec
//! §4.3. Platform matching itself lives in [`crate::platform`]; this module
//! is the per-ecosystem policy for using those tag lists to rank
//! candidates.

pub mod conda;
pub mod os_pkg;
pub mod pypi;

use crate::models::error::EngineError;
use crate::models::ecosystem::EcosystemKind;

/// Shared "no candidate survived filtering" error constructor.
pub fn no_compatible_artifact(
    ecosystem: EcosystemKind,
    name: &str,
    version: &str,
    candidates_considered: usize,
    tags_considered: Vec<String>,
) -> EngineError {
    EngineError::NoCompatibleArtifact {
        ecosystem,
        name: name.to_string(),
        version: version.to_string(),
        candidates_considered,
        tags_considered,
    }
}

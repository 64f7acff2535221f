// Core data model: the types that flow through the resolution-and-
// acquisition pipeline (spec §3). Persistence, project manifests and
// virtual-environment/symlink layout are external-collaborator concerns
// (spec §1) and are not modeled here.
pub mod artifact;
pub mod cache_entry;
pub mod conflict;
pub mod ecosystem;
pub mod error;
pub mod failure;
pub mod graph;
pub mod options;
pub mod package_ref;
pub mod resolved_package;
pub mod target;

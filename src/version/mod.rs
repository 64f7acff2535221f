//! Per-ecosystem version comparison, kept in separate modules behind one
//! shared interface rather than one comparator shared across ecosystems —
//! per the §9 redesign flag ("their rules differ in subtle ways: PEP 440
//! epochs, conda pre-release ordering, Maven's qualifier matrix, semver's
//! prerelease rules").

pub mod conda;
pub mod maven;
pub mod npm;
pub mod pypi;

use std::cmp::Ordering;

/// Common comparison surface every ecosystem's version module implements,
/// so the resolvers can stay generic over "pick the highest compatible
/// version" without sharing comparison *logic*.
pub trait VersionOrdering {
    fn compare(&self, a: &str, b: &str) -> Option<Ordering>;
    fn satisfies(&self, version: &str, spec: &str) -> bool;
}

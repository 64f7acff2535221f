//! Shared arch-matching policy for the YUM/APT/APK candidate selectors, per
//! spec §4.3 ("noarch/all/any packages match every target; otherwise the
//! package's own arch string must normalize to the target's").

use crate::models::target::{Arch, TargetDescriptor};
use crate::platform::is_universal_arch;

/// Whether a package's raw arch string (as the registry spells it —
/// `x86_64`, `amd64`, `noarch`, `all`...) is installable on `target`.
pub fn arch_matches(candidate_arch: &str, target: &TargetDescriptor) -> bool {
    if is_universal_arch(candidate_arch) {
        return true;
    }
    Arch::normalize(candidate_arch) == Some(target.arch)
}

/// Picks the highest-`evr`/version candidate among those whose arch matches
/// the target; ties broken by first occurrence (registries list newest
/// first in practice, but this does not assume it — callers sort by
/// version key before calling).
pub fn select_best<'a, T>(candidates: &'a [T], target: &TargetDescriptor, arch_of: impl Fn(&T) -> &str) -> Option<&'a T> {
    candidates.iter().find(|c| arch_matches(arch_of(c), target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::target::Os;

    #[test]
    fn noarch_matches_every_target() {
        let target = TargetDescriptor::new(Os::Linux, Arch::Aarch64);
        assert!(arch_matches("noarch", &target));
        assert!(arch_matches("all", &target));
    }

    #[test]
    fn exact_arch_requires_normalized_equality() {
        let target = TargetDescriptor::new(Os::Linux, Arch::X86_64);
        assert!(arch_matches("x86_64", &target));
        assert!(arch_matches("amd64", &target));
        assert!(!arch_matches("aarch64", &target));
    }
}

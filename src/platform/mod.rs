//! Platform matcher: produces, for a `TargetDescriptor`, an ordered list of
//! acceptance tokens whose leftmost match wins, per spec §4.3.
//!
//! No teacher precedent exists for this — `ppm` only ever targeted the host
//! it ran on. Grounded instead on the wheel-tag and conda-subdir handling in
//! the pack's `rattler_conda_types::repo_data` and uv's `puffin-resolver`
//! wheel finder.

use crate::models::target::{Arch, Interpreter, Os, TargetDescriptor};

/// An ordered, deduplicated list of wheel tags; index is priority (lower
/// wins), per spec §4.3/§8 ("tag priority monotonicity").
#[derive(Debug, Clone)]
pub struct WheelTagList(pub Vec<String>);

impl WheelTagList {
    /// Index of `tag` in the ordered list, or `None` if it does not appear.
    pub fn priority_of(&self, tag: &str) -> Option<usize> {
        self.0.iter().position(|t| t == tag)
    }
}

/// Generates the PEP 425 `{python}-{abi}-{platform}` tag list for a target,
/// richest-first, per spec §4.3.
pub fn pep425_tags(target: &TargetDescriptor) -> WheelTagList {
    let mut tags = Vec::new();
    let Some(interpreter) = &target.interpreter else {
        return WheelTagList(tags);
    };
    let Some((major, minor)) = interpreter.major_minor() else {
        return WheelTagList(tags);
    };
    let impl_tag = interpreter.implementation.tag();
    let platform_tags = platform_tags(target);

    // 1. interpreter-exact CPython, richest platform tag first.
    for plat in &platform_tags {
        tags.push(format!("{impl_tag}{major}{minor}-{impl_tag}{major}{minor}-{plat}"));
    }

    // 2. stable-ABI cp{MN}-abi3-{plat}, descending M from the target's minor
    //    down to 3.2 (abi3 was introduced at 3.2).
    if impl_tag == "cp" {
        for m in (2..=minor).rev() {
            for plat in &platform_tags {
                tags.push(format!("cp{major}{m}-abi3-{plat}"));
            }
        }
    }

    // 3. cp{MN}-none-{plat}
    for plat in &platform_tags {
        tags.push(format!("{impl_tag}{major}{minor}-none-{plat}"));
    }

    // 4. generic py{MN}-none-{plat} then py{M}-none-{plat}
    for plat in &platform_tags {
        tags.push(format!("py{major}{minor}-none-{plat}"));
    }
    for plat in &platform_tags {
        tags.push(format!("py{major}-none-{plat}"));
    }

    // 5. py*-none-any, universal fallback.
    tags.push("py3-none-any".to_string());
    tags.push(format!("py{major}-none-any"));

    WheelTagList(tags)
}

/// Ordered per-OS platform tags (richest/newest first), per spec §4.3.
fn platform_tags(target: &TargetDescriptor) -> Vec<String> {
    let arch = target.arch;
    match target.os {
        Os::Linux => {
            let mut tags = Vec::new();
            // manylinux_{glibc_major}_{glibc_minor}_{arch}, newest first
            // (2.35 down to 2.5), per spec §4.3.
            for minor in (5..=35).rev() {
                tags.push(format!("manylinux_2_{minor}_{arch}"));
            }
            tags.push(format!("manylinux2014_{arch}"));
            tags.push(format!("manylinux2010_{arch}"));
            tags.push(format!("manylinux1_{arch}"));
            for minor in (0..=30).rev() {
                tags.push(format!("musllinux_1_{minor}_{arch}"));
            }
            tags.push(format!("linux_{arch}"));
            tags
        }
        Os::Macos => {
            let mut tags = Vec::new();
            for major in (10..=14).rev() {
                for minor in (0..=15).rev() {
                    tags.push(format!("macosx_{major}_{minor}_{arch}"));
                    if arch == Arch::X86_64 {
                        tags.push(format!("macosx_{major}_{minor}_intel"));
                    }
                    tags.push(format!("macosx_{major}_{minor}_universal2"));
                }
            }
            tags
        }
        Os::Windows => match arch {
            Arch::X86_64 => vec!["win_amd64".to_string()],
            Arch::Aarch64 => vec!["win_arm64".to_string()],
            _ => vec!["win32".to_string()],
        },
        Os::Any => vec!["any".to_string()],
    }
}

/// Conda subdir map, per spec §4.3. Returns `None` when no mapping exists
/// (caller surfaces `ConfigError` — "impossible target descriptor").
pub fn conda_subdir(target: &TargetDescriptor) -> Option<&'static str> {
    match (target.os, target.arch) {
        (Os::Linux, Arch::X86_64) => Some("linux-64"),
        (Os::Linux, Arch::Aarch64) => Some("linux-aarch64"),
        (Os::Macos, Arch::X86_64) => Some("osx-64"),
        (Os::Macos, Arch::Aarch64) => Some("osx-arm64"),
        (Os::Windows, Arch::X86_64) => Some("win-64"),
        _ => None,
    }
}

/// Substitutes `$basearch` (RPM form) in a YUM repo URL template.
pub fn substitute_rpm_basearch(url_template: &str, target: &TargetDescriptor) -> String {
    url_template.replace("$basearch", &target.arch.to_string())
}

/// Substitutes `$arch` (DEB form) in an APT repo URL template.
pub fn substitute_deb_arch(url_template: &str, target: &TargetDescriptor) -> String {
    let deb_arch = match target.arch {
        Arch::X86_64 => "amd64",
        Arch::Aarch64 => "arm64",
        Arch::I686 => "i386",
        Arch::Armv7 => "armhf",
        Arch::Noarch => "all",
    };
    url_template.replace("$arch", deb_arch)
}

/// Returns whether `candidate_arch` is universal (matches any target).
pub fn is_universal_arch(candidate_arch: &str) -> bool {
    matches!(candidate_arch, "noarch" | "all" | "any")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::target::{Interpreter, TargetDescriptor};

    fn cp311_linux_x86_64() -> TargetDescriptor {
        TargetDescriptor::new(Os::Linux, Arch::X86_64).with_interpreter(Interpreter::cpython("3.11"))
    }

    #[test]
    fn exact_interpreter_tag_outranks_stable_abi_and_generic() {
        let tags = pep425_tags(&cp311_linux_x86_64());
        let exact_idx = tags.priority_of("cp311-cp311-manylinux_2_17_x86_64").unwrap();
        let abi3_idx = tags
            .0
            .iter()
            .position(|t| t.starts_with("cp3") && t.contains("abi3"))
            .unwrap();
        let any_idx = tags.priority_of("py3-none-any").unwrap();
        assert!(exact_idx < abi3_idx);
        assert!(abi3_idx < any_idx);
    }

    #[test]
    fn pure_wheel_any_tag_is_always_present() {
        let tags = pep425_tags(&cp311_linux_x86_64());
        assert!(tags.priority_of("py3-none-any").is_some());
    }

    #[test]
    fn conda_subdir_maps_known_platforms() {
        let target = TargetDescriptor::new(Os::Linux, Arch::X86_64);
        assert_eq!(conda_subdir(&target), Some("linux-64"));
        let target = TargetDescriptor::new(Os::Macos, Arch::Aarch64);
        assert_eq!(conda_subdir(&target), Some("osx-arm64"));
    }

    #[test]
    fn conda_subdir_is_none_for_unmapped_combination() {
        let target = TargetDescriptor::new(Os::Windows, Arch::Aarch64);
        assert_eq!(conda_subdir(&target), None);
    }

    #[test]
    fn basearch_and_arch_substitution() {
        let target = TargetDescriptor::new(Os::Linux, Arch::X86_64);
        assert_eq!(
            substitute_rpm_basearch("https://mirror/$basearch/os", &target),
            "https://mirror/x86_64/os"
        );
        assert_eq!(
            substitute_deb_arch("https://mirror/binary-$arch/", &target),
            "https://mirror/binary-amd64/"
        );
    }
}

//! Selects the best wheel (or sdist fallback) for a target from a PyPI
//! release's file list, per spec §4.3 ("leftmost tag match wins; sdist is
//! the last resort when `prefer_binary` finds nothing").

use crate::models::target::TargetDescriptor;
use crate::platform::{pep425_tags, WheelTagList};
use crate::registry::pypi::PypiFileJson;

/// Parses the three dash-delimited tag components off a wheel filename —
/// `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl` — and expands
/// each component's dot-compressed set (`py2.py3-none-any` packs two
/// compatibility tags into one filename) into every `{python}-{abi}-{platform}`
/// combination it represents, per spec §4.3 ("a wheel matches iff at least
/// one of its expanded filename tags appears in the target list").
fn wheel_tags(filename: &str) -> Option<Vec<String>> {
    let stem = filename.strip_suffix(".whl")?;
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() < 5 {
        return None;
    }
    let platforms: Vec<&str> = parts[parts.len() - 1].split('.').collect();
    let abis: Vec<&str> = parts[parts.len() - 2].split('.').collect();
    let pythons: Vec<&str> = parts[parts.len() - 3].split('.').collect();

    let mut tags = Vec::with_capacity(pythons.len() * abis.len() * platforms.len());
    for python in &pythons {
        for abi in &abis {
            for platform in &platforms {
                tags.push(format!("{python}-{abi}-{platform}"));
            }
        }
    }
    Some(tags)
}

/// Picks the file with the lowest (best) tag priority; falls back to the
/// first `.tar.gz`/`.zip` sdist if `prefer_binary` permits, and to `None`
/// when nothing in the list is usable for this target at all.
pub fn select_best_file<'a>(
    files: &'a [PypiFileJson],
    target: &TargetDescriptor,
    prefer_binary: bool,
    allow_yanked: bool,
) -> Option<&'a PypiFileJson> {
    let tags: WheelTagList = pep425_tags(target);
    let usable: Vec<&PypiFileJson> = files.iter().filter(|f| allow_yanked || !f.yanked).collect();

    let mut best: Option<(usize, &PypiFileJson)> = None;
    for file in &usable {
        if !file.filename.ends_with(".whl") {
            continue;
        }
        let Some(file_tags) = wheel_tags(&file.filename) else { continue };
        let Some(priority) = file_tags.iter().filter_map(|tag| tags.priority_of(tag)).min() else { continue };
        if best.as_ref().map(|(p, _)| priority < *p).unwrap_or(true) {
            best = Some((priority, file));
        }
    }
    if let Some((_, file)) = best {
        return Some(file);
    }

    if prefer_binary || !usable.iter().any(|f| !f.filename.ends_with(".whl")) {
        return None;
    }

    usable.into_iter().find(|f| f.packagetype == "sdist" || f.filename.ends_with(".tar.gz"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::target::{Arch, Interpreter, Os};
    use std::collections::HashMap;

    fn file(filename: &str, packagetype: &str, yanked: bool) -> PypiFileJson {
        PypiFileJson {
            filename: filename.to_string(),
            url: format!("https://files.pythonhosted.org/packages/x/{filename}"),
            digests: HashMap::new(),
            size: 100,
            yanked,
            packagetype: packagetype.to_string(),
            requires_python: None,
        }
    }

    fn cp311_linux() -> TargetDescriptor {
        TargetDescriptor::new(Os::Linux, Arch::X86_64).with_interpreter(Interpreter::cpython("3.11"))
    }

    #[test]
    fn prefers_exact_manylinux_wheel_over_sdist() {
        let files = vec![
            file("pkg-1.0.0.tar.gz", "sdist", false),
            file("pkg-1.0.0-cp311-cp311-manylinux_2_17_x86_64.whl", "bdist_wheel", false),
        ];
        let selected = select_best_file(&files, &cp311_linux(), true, false).unwrap();
        assert!(selected.filename.ends_with(".whl"));
    }

    #[test]
    fn falls_back_to_sdist_when_no_wheel_matches() {
        let files = vec![file("pkg-1.0.0.tar.gz", "sdist", false), file("pkg-1.0.0-cp311-cp311-win_amd64.whl", "bdist_wheel", false)];
        let selected = select_best_file(&files, &cp311_linux(), false, false).unwrap();
        assert_eq!(selected.packagetype, "sdist");
    }

    #[test]
    fn excludes_yanked_files_by_default() {
        let files = vec![file("pkg-1.0.0-py3-none-any.whl", "bdist_wheel", true)];
        assert!(select_best_file(&files, &cp311_linux(), true, false).is_none());
        assert!(select_best_file(&files, &cp311_linux(), true, true).is_some());
    }

    #[test]
    fn wheel_tags_expands_a_compressed_python_tag_set() {
        let tags = wheel_tags("six-1.16.0-py2.py3-none-any.whl").unwrap();
        assert_eq!(tags, vec!["py2-none-any".to_string(), "py3-none-any".to_string()]);
    }

    #[test]
    fn wheel_tags_passes_through_an_uncompressed_wheel_unchanged() {
        let tags = wheel_tags("pkg-1.0.0-cp311-cp311-manylinux_2_17_x86_64.whl").unwrap();
        assert_eq!(tags, vec!["cp311-cp311-manylinux_2_17_x86_64".to_string()]);
    }

    #[test]
    fn a_universal_py2_py3_wheel_is_selected_instead_of_falling_back_to_sdist() {
        let files = vec![file("six-1.16.0.tar.gz", "sdist", false), file("six-1.16.0-py2.py3-none-any.whl", "bdist_wheel", false)];
        let selected = select_best_file(&files, &cp311_linux(), true, false).unwrap();
        assert!(selected.filename.ends_with(".whl"));
    }
}

//! Filename sanitization for the download scheduler's output directory,
//! per spec §6: Windows-forbidden characters, trailing dots/spaces,
//! reserved device names, and the 260-char path-length ceiling.

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];
const LONG_PATH_PREFIX: &str = r"\\?\";
const MAX_PATH_LEN: usize = 260;

/// Replaces every Windows-forbidden character with `_`, then strips
/// trailing dots/spaces, then prefixes reserved device-stem names.
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();

    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }

    if sanitized.is_empty() {
        sanitized.push('_');
    }

    let stem = sanitized.split('.').next().unwrap_or(&sanitized).to_uppercase();
    if RESERVED.contains(&stem.as_str()) {
        sanitized = format!("_{sanitized}");
    }

    cap_length(&sanitized)
}

fn cap_length(name: &str) -> String {
    if name.len() <= MAX_PATH_LEN {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    let keep = MAX_PATH_LEN.saturating_sub(ext.len());
    let truncated: String = stem.chars().take(keep).collect();
    format!("{truncated}{ext}")
}

/// Prefixes a path with the Windows long-path marker when it would exceed
/// the 260-character MAX_PATH limit. No-op on platforms where this does not
/// apply; the marker is inert everywhere else since it is only consumed by
/// Windows path APIs.
pub fn with_long_path_marker_if_needed(path: &str) -> String {
    if cfg!(windows) && path.len() > MAX_PATH_LEN && !path.starts_with(LONG_PATH_PREFIX) {
        format!("{LONG_PATH_PREFIX}{path}")
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_characters_are_replaced() {
        assert_eq!(sanitize_filename("a:b/c*d"), "a_b_c_d");
    }

    #[test]
    fn trailing_dots_and_spaces_are_stripped() {
        assert_eq!(sanitize_filename("package. "), "package");
    }

    #[test]
    fn reserved_device_names_are_prefixed() {
        assert_eq!(sanitize_filename("CON.txt"), "_CON.txt");
        assert_eq!(sanitize_filename("lpt1"), "_lpt1");
    }

    #[test]
    fn long_names_are_capped_preserving_extension() {
        let long_name = format!("{}.whl", "a".repeat(300));
        let result = sanitize_filename(&long_name);
        assert!(result.len() <= MAX_PATH_LEN);
        assert!(result.ends_with(".whl"));
    }
}

//! Maven version comparison, per Maven's own qualifier matrix (no
//! general-purpose crate in the pack implements this — grounded on the
//! ordering Maven's `ComparableVersion` documents: numeric tokens compare
//! numerically, qualifier tokens compare via a fixed rank table, unknown
//! qualifiers compare lexically after the known ones).

use std::cmp::Ordering;

use super::VersionOrdering;

pub struct MavenVersion;

impl VersionOrdering for MavenVersion {
    fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        Some(compare_maven(a, b))
    }

    fn satisfies(&self, version: &str, spec: &str) -> bool {
        // Maven's own plugin ecosystem range syntax `[1.0,2.0)` is rare in
        // ordinary dependency declarations (spec's nearest-wins resolver
        // works on exact pinned/managed versions, not ranges); a bare spec
        // is treated as an exact match, matching how `dependencyManagement`
        // pins are consumed.
        if let Some(inner) = spec.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some((lo, hi)) = inner.split_once(',') {
                let above_lo = lo.is_empty() || compare_maven(version, lo) != Ordering::Less;
                let below_hi = hi.is_empty() || compare_maven(version, hi) != Ordering::Greater;
                return above_lo && below_hi;
            }
        }
        compare_maven(version, spec) == Ordering::Equal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Numeric(u64),
    Qualifier(String),
}

fn qualifier_rank(q: &str) -> i32 {
    match q.to_lowercase().as_str() {
        "alpha" => 0,
        "beta" => 1,
        "milestone" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => 5,
        "sp" => 6,
        _ => 7,
    }
}

fn tokenize(version: &str) -> Vec<Token> {
    let normalized = version.replace('-', ".");
    normalized
        .split('.')
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u64>() {
            Ok(n) => Token::Numeric(n),
            Err(_) => Token::Qualifier(s.to_string()),
        })
        .collect()
}

fn compare_maven(a: &str, b: &str) -> Ordering {
    let ta = tokenize(a);
    let tb = tokenize(b);
    let len = ta.len().max(tb.len());
    for i in 0..len {
        let left = ta.get(i);
        let right = tb.get(i);
        let ordering = match (left, right) {
            (Some(Token::Numeric(x)), Some(Token::Numeric(y))) => x.cmp(y),
            (Some(Token::Numeric(x)), None) => x.cmp(&0).then(Ordering::Greater),
            (None, Some(Token::Numeric(y))) => 0u64.cmp(y).then(Ordering::Less),
            (Some(Token::Qualifier(x)), Some(Token::Qualifier(y))) => {
                qualifier_rank(x).cmp(&qualifier_rank(y)).then_with(|| x.cmp(y))
            }
            (Some(Token::Qualifier(x)), None) => qualifier_rank(x).cmp(&qualifier_rank("")),
            (None, Some(Token::Qualifier(y))) => qualifier_rank("").cmp(&qualifier_rank(y)),
            (Some(Token::Numeric(_)), Some(Token::Qualifier(_))) => Ordering::Greater,
            (Some(Token::Qualifier(_)), Some(Token::Numeric(_))) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_tokens_compare_numerically_not_lexically() {
        assert_eq!(compare_maven("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn qualifiers_rank_below_release() {
        assert_eq!(compare_maven("1.0-alpha", "1.0"), Ordering::Less);
        assert_eq!(compare_maven("1.0-rc1", "1.0-beta1"), Ordering::Greater);
    }

    #[test]
    fn snapshot_sorts_below_release() {
        assert_eq!(compare_maven("1.0-SNAPSHOT", "1.0"), Ordering::Less);
    }
}

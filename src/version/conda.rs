//! Conda version comparison. Conda's version scheme is PEP-440-flavored but
//! not identical (`_` is a valid separator, and `post`/`dev` segments order
//! the same as PEP 440 but are evaluated independently of `pep440_rs`,
//! which rejects some strings conda accepts) — kept as its own module per
//! the §9 redesign flag rather than reusing [`crate::version::pypi`].

use std::cmp::Ordering;

use super::VersionOrdering;

pub struct CondaVersion;

impl VersionOrdering for CondaVersion {
    fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        Some(compare_conda(a, b))
    }

    fn satisfies(&self, version: &str, spec: &str) -> bool {
        match_spec(version, spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(u64),
    Dev,
    Post,
    Alpha(u64),
    Rc(u64),
    Other(String),
}

fn segment_rank(seg: &Segment) -> i32 {
    match seg {
        Segment::Dev => 0,
        Segment::Alpha(_) => 1,
        Segment::Rc(_) => 2,
        Segment::Num(_) | Segment::Other(_) => 3,
        Segment::Post => 4,
    }
}

fn parse_segment(token: &str) -> Segment {
    let lower = token.to_lowercase();
    if lower == "dev" {
        Segment::Dev
    } else if lower == "post" {
        Segment::Post
    } else if let Some(n) = lower.strip_prefix("a").and_then(|s| s.parse::<u64>().ok()) {
        Segment::Alpha(n)
    } else if let Some(n) = lower.strip_prefix("rc").and_then(|s| s.parse::<u64>().ok()) {
        Segment::Rc(n)
    } else if let Ok(n) = token.parse::<u64>() {
        Segment::Num(n)
    } else {
        Segment::Other(lower)
    }
}

fn tokenize(version: &str) -> Vec<Segment> {
    version
        .replace(['_', '-'], ".")
        .split('.')
        .filter(|s| !s.is_empty())
        .map(parse_segment)
        .collect()
}

fn compare_conda(a: &str, b: &str) -> Ordering {
    let ta = tokenize(a);
    let tb = tokenize(b);
    let len = ta.len().max(tb.len());
    for i in 0..len {
        let left = ta.get(i).cloned().unwrap_or(Segment::Num(0));
        let right = tb.get(i).cloned().unwrap_or(Segment::Num(0));
        let ordering = segment_rank(&left).cmp(&segment_rank(&right)).then_with(|| match (&left, &right) {
            (Segment::Num(x), Segment::Num(y)) => x.cmp(y),
            (Segment::Alpha(x), Segment::Alpha(y)) => x.cmp(y),
            (Segment::Rc(x), Segment::Rc(y)) => x.cmp(y),
            (Segment::Other(x), Segment::Other(y)) => x.cmp(y),
            _ => Ordering::Equal,
        });
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Minimal MatchSpec matching: `name`, `name version`, `name==version`,
/// `name>=version`, or an exact version string. A comma-joined spec
/// (`">=3.11,<3.12.0a0"`, as conda `depends` entries commonly are) is
/// treated as a conjunction of single-operator clauses.
fn match_spec(version: &str, spec: &str) -> bool {
    let spec = spec.trim();
    if spec.is_empty() || spec == "*" {
        return true;
    }
    if spec.contains(',') {
        return spec.split(',').all(|clause| match_spec(version, clause));
    }
    for (op, cmp) in [
        (">=", Ordering::Less),
        ("<=", Ordering::Greater),
        ("!=", Ordering::Equal),
        ("==", Ordering::Equal),
        (">", Ordering::Greater),
        ("<", Ordering::Less),
    ] {
        if let Some(rest) = spec.strip_prefix(op) {
            let ordering = compare_conda(version, rest.trim());
            return match op {
                ">=" => ordering != cmp,
                "<=" => ordering != cmp,
                "!=" => ordering != cmp,
                "==" => ordering == cmp,
                ">" => ordering == cmp,
                "<" => ordering == cmp,
                _ => unreachable!(),
            };
        }
    }
    compare_conda(version, spec) == Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_sorts_below_release_which_sorts_below_post() {
        assert_eq!(compare_conda("1.0.dev0", "1.0"), Ordering::Less);
        assert_eq!(compare_conda("1.0", "1.0.post0"), Ordering::Less);
    }

    #[test]
    fn match_spec_handles_comparison_operators() {
        assert!(match_spec("1.16.0", ">=1.10.0"));
        assert!(!match_spec("1.5.0", ">=1.10.0"));
        assert!(match_spec("1.16.0", "==1.16.0"));
    }

    #[test]
    fn match_spec_conjoins_comma_separated_clauses() {
        assert!(match_spec("3.11.4", ">=3.11,<3.12.0a0"));
        assert!(!match_spec("3.12.0", ">=3.11,<3.12.0a0"));
    }
}

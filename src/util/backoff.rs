//! Exponential backoff with full jitter for transient download/registry
//! failures, per spec §4.6 (base 500ms, cap 8s) and §8's retry-budget
//! property.

use std::time::Duration;

const BASE_MS: u64 = 500;
const CAP_MS: u64 = 8_000;

/// Computes the backoff ceiling for `attempt` (0-indexed) using decorrelated
/// exponential growth capped at `CAP_MS`. Callers sample a uniform jittered
/// duration in `[0, ceiling]` via [`jittered_delay`] rather than using the
/// ceiling directly, so concurrent retries don't thunder in lockstep.
fn ceiling_ms(attempt: u32) -> u64 {
    let exp = BASE_MS.saturating_mul(1u64 << attempt.min(16));
    exp.min(CAP_MS)
}

/// Returns a full-jitter delay for the given retry attempt (0-indexed),
/// using `rand_source` (0.0..=1.0) so tests can drive it deterministically
/// instead of depending on a global RNG.
pub fn jittered_delay(attempt: u32, rand_source: f64) -> Duration {
    let ceiling = ceiling_ms(attempt);
    let sampled = (ceiling as f64 * rand_source.clamp(0.0, 1.0)).round() as u64;
    Duration::from_millis(sampled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_grows_exponentially_then_caps() {
        assert_eq!(ceiling_ms(0), 500);
        assert_eq!(ceiling_ms(1), 1000);
        assert_eq!(ceiling_ms(2), 2000);
        assert_eq!(ceiling_ms(4), 8000);
        assert_eq!(ceiling_ms(10), 8000);
    }

    #[test]
    fn jitter_stays_within_the_ceiling() {
        let delay = jittered_delay(3, 1.0);
        assert_eq!(delay, Duration::from_millis(ceiling_ms(3)));
        let delay_zero = jittered_delay(3, 0.0);
        assert_eq!(delay_zero, Duration::from_millis(0));
    }
}

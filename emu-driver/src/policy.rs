//! Baseline replacement policies.
//!
//! Each policy looks at the emulator's step output (candidates, their
//! hit-test frequencies, or their feature rows) and prescribes the cache's
//! next occupancy. These are reference baselines for trace studies, not
//! learned agents: the interesting controller lives outside this crate and
//! talks to the same surface.

use cache_emu_rs::{CacheEmu, Content};

/// Replacement policies the driver can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Policy {
    /// Never rewrite the cache; every request misses.
    Noop,
    /// Keep the candidates with the highest hit-test frequency this step.
    TopFrequency,
    /// Keep the candidates with the highest summed feature score.
    FeatureScore,
}

impl Policy {
    /// Short display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Noop => "noop",
            Policy::TopFrequency => "top-frequency",
            Policy::FeatureScore => "feature-score",
        }
    }

    /// All policies.
    pub fn all() -> Vec<Policy> {
        vec![Policy::Noop, Policy::TopFrequency, Policy::FeatureScore]
    }

    /// Parses a policy name as given on the command line.
    pub fn parse(name: &str) -> Option<Policy> {
        match name.to_ascii_lowercase().as_str() {
            "noop" => Some(Policy::Noop),
            "top-frequency" | "frequency" => Some(Policy::TopFrequency),
            "feature-score" | "score" => Some(Policy::FeatureScore),
            _ => None,
        }
    }

    /// Decides the next cache occupancy from the last step's output, or
    /// `None` to leave the cache untouched.
    pub fn decide(&self, emu: &mut CacheEmu, capacity: usize) -> Option<Vec<Content>> {
        match self {
            Policy::Noop => None,
            Policy::TopFrequency => {
                let scores: Vec<f32> = emu.candidate_frequencies().to_vec();
                Some(keep_top(emu.candidates(), &scores, capacity))
            }
            Policy::FeatureScore => {
                let candidates = emu.candidates().to_vec();
                let matrix = emu.features(&candidates);
                let (rows, dims) = matrix.shape();
                let scores: Vec<f32> = (0..rows)
                    .map(|r| (0..dims).map(|d| matrix.get(r, d)).sum())
                    .collect();
                Some(keep_top(&candidates, &scores, capacity))
            }
        }
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `capacity` non-sentinel candidates with the highest scores, ties
/// broken by content id for determinism.
fn keep_top(candidates: &[Content], scores: &[f32], capacity: usize) -> Vec<Content> {
    let mut scored: Vec<(Content, f32)> = candidates
        .iter()
        .copied()
        .zip(scores.iter().copied())
        .filter(|&(c, _)| c >= 0)
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.dedup_by_key(|&mut (c, _)| c);
    scored.truncate(capacity);
    scored.into_iter().map(|(c, _)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_top_orders_and_truncates() {
        let candidates = [-1, -1, 3, 9, 4];
        let scores = [0.0, 0.0, 2.0, 5.0, 2.0];
        assert_eq!(keep_top(&candidates, &scores, 2), vec![9, 3]);
        assert_eq!(keep_top(&candidates, &scores, 10), vec![9, 3, 4]);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(Policy::parse("NOOP"), Some(Policy::Noop));
        assert_eq!(Policy::parse("frequency"), Some(Policy::TopFrequency));
        assert_eq!(Policy::parse("score"), Some(Policy::FeatureScore));
        assert_eq!(Policy::parse("bogus"), None);
    }
}

//! Frequency feature: total access count per content.

use hashbrown::HashMap;

use crate::error::EmuError;
use crate::feature::{FeatureExtractor, FeatureMatrix};
use crate::trace::{Content, Slice};

/// Access-count extractor. A never-seen content reads as `0`.
#[derive(Debug, Default)]
pub struct LfuFeature {
    counts: HashMap<Content, u64>,
    matrix: FeatureMatrix,
}

impl LfuFeature {
    /// Creates the extractor with an empty count table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureExtractor for LfuFeature {
    fn name(&self) -> &'static str {
        "LFU"
    }

    fn reset(&mut self) {
        tracing::debug!("LfuFeature reset");
        self.counts.clear();
    }

    fn update(&mut self, slice: &Slice<'_>) -> Result<(), EmuError> {
        for r in slice.iter() {
            *self.counts.entry(r.content_id).or_insert(0) += 1;
        }
        Ok(())
    }

    fn features(&mut self, contents: &[Content]) -> &FeatureMatrix {
        self.matrix.resize(contents.len(), 1);
        for (i, &c) in contents.iter().enumerate() {
            let count = self.counts.get(&c).copied().unwrap_or(0);
            self.matrix.set(i, 0, count as f32);
        }
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Request;

    #[test]
    fn test_counts_accumulate_across_slices() {
        let mut f = LfuFeature::new();
        let s1 = [Request::new(1, 0), Request::new(1, 0), Request::new(2, 0)];
        let s2 = [Request::new(1, 1)];
        f.update(&Slice::new(&s1)).unwrap();
        f.update(&Slice::new(&s2)).unwrap();

        assert_eq!(f.features(&[1, 2, 3]).as_slice(), &[3.0, 1.0, 0.0]);
    }

    #[test]
    fn test_reset_zeroes_counts() {
        let mut f = LfuFeature::new();
        let reqs = [Request::new(1, 0)];
        f.update(&Slice::new(&reqs)).unwrap();
        f.reset();
        assert_eq!(f.features(&[1]).as_slice(), &[0.0]);
    }
}

//! Recency feature.
//!
//! Tracks the last timestamp each content was requested at. The feature for
//! content `c` is `-(latest - last_seen(c))`: the age of the last access,
//! negated so that a more recent access yields a larger value, matching the
//! sign convention of the frequency features. A never-seen content reads as
//! `last_seen = -1`.

use hashbrown::HashMap;

use crate::error::EmuError;
use crate::feature::{FeatureExtractor, FeatureMatrix};
use crate::trace::{Content, Slice, Timestamp};

const NEVER_SEEN: Timestamp = -1;

/// Last-access-time extractor.
#[derive(Debug)]
pub struct LruFeature {
    last_seen: HashMap<Content, Timestamp>,
    latest: Timestamp,
    matrix: FeatureMatrix,
}

impl LruFeature {
    /// Creates the extractor with an empty last-seen table.
    pub fn new() -> Self {
        Self {
            last_seen: HashMap::new(),
            latest: NEVER_SEEN,
            matrix: FeatureMatrix::new(),
        }
    }
}

impl FeatureExtractor for LruFeature {
    fn name(&self) -> &'static str {
        "LRU"
    }

    fn reset(&mut self) {
        tracing::debug!("LruFeature reset");
        self.last_seen.clear();
        self.latest = NEVER_SEEN;
    }

    fn update(&mut self, slice: &Slice<'_>) -> Result<(), EmuError> {
        for r in slice.iter() {
            self.last_seen.insert(r.content_id, r.timestamp);
        }
        if let Some(last) = slice.last() {
            self.latest = last.timestamp;
        }
        Ok(())
    }

    fn features(&mut self, contents: &[Content]) -> &FeatureMatrix {
        self.matrix.resize(contents.len(), 1);
        for (i, &c) in contents.iter().enumerate() {
            let seen = self.last_seen.get(&c).copied().unwrap_or(NEVER_SEEN);
            self.matrix.set(i, 0, -((self.latest - seen) as f32));
        }
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Request;

    #[test]
    fn test_more_recent_is_larger() {
        let mut f = LruFeature::new();
        let reqs = [Request::new(1, 0), Request::new(2, 5), Request::new(3, 9)];
        f.update(&Slice::new(&reqs)).unwrap();

        let m = f.features(&[1, 2, 3]);
        assert_eq!(m.as_slice(), &[-9.0, -4.0, 0.0]);
        assert!(m.get(2, 0) > m.get(1, 0));
    }

    #[test]
    fn test_unseen_content_reads_as_initial() {
        let mut f = LruFeature::new();
        let reqs = [Request::new(1, 10)];
        f.update(&Slice::new(&reqs)).unwrap();

        // latest=10, last_seen=-1: age 11, negated.
        assert_eq!(f.features(&[99]).as_slice(), &[-11.0]);
    }

    #[test]
    fn test_reset_clears_table() {
        let mut f = LruFeature::new();
        let reqs = [Request::new(1, 3)];
        f.update(&Slice::new(&reqs)).unwrap();
        f.reset();
        assert_eq!(f.features(&[1]).as_slice(), &[0.0]);
    }

    #[test]
    fn test_empty_slice_keeps_latest() {
        let mut f = LruFeature::new();
        let reqs = [Request::new(1, 4)];
        f.update(&Slice::new(&reqs)).unwrap();
        f.update(&Slice::new(&[])).unwrap();
        assert_eq!(f.features(&[1]).as_slice(), &[0.0]);
    }
}

//! Sliding-window frequency feature.
//!
//! Counts accesses per content over the trailing `window_len` time-slices.
//! The extractor shares the loader so it can re-read historical slices when
//! the window moves: after feeding a slice, every slice that fell out of the
//! window is fetched from the loader and its requests are subtracted from
//! the count table. The feature for content `c` is its windowed count
//! normalized by the number of requests currently in the window.
//!
//! ```text
//!                         window_len = 3
//!          ┌───────────────────────────┐
//! slices:  │  s4     s5     s6     s7  │   current = s7
//!  ...s3 ──┘ (s3 subtracted when s7 arrived)
//! ```
//!
//! The window sum invariant holds after every update: `sum(counts) ==
//! history_num_requests ==` number of requests in the trailing window.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::EmuError;
use crate::feature::{FeatureExtractor, FeatureMatrix};
use crate::trace::{Content, RequestLoader, Slice, Timestamp, EPS};

/// Windowed access-count extractor.
pub struct SwLfuFeature {
    window_len: usize,
    loader: Arc<RequestLoader>,
    counts: HashMap<Content, i64>,
    history_num_requests: i64,
    i_slice: usize,
    matrix: FeatureMatrix,
}

impl SwLfuFeature {
    /// Creates the extractor over `loader` with a window of `window_len`
    /// slices.
    pub fn new(window_len: usize, loader: Arc<RequestLoader>) -> Self {
        Self {
            window_len,
            loader,
            counts: HashMap::new(),
            history_num_requests: 0,
            i_slice: 0,
            matrix: FeatureMatrix::new(),
        }
    }

    /// Number of requests currently inside the window.
    #[inline]
    pub fn history_num_requests(&self) -> i64 {
        self.history_num_requests
    }

    /// Windowed count of `content`.
    #[inline]
    pub fn count(&self, content: Content) -> i64 {
        self.counts.get(&content).copied().unwrap_or(0)
    }

    // Subtracts every slice that left the window ending at `timestamp`.
    fn expire_history(&mut self, timestamp: Timestamp) -> Result<(), EmuError> {
        let curr_i_slice = self.loader.slice_index_by_time(timestamp)?;
        if curr_i_slice != self.i_slice && curr_i_slice > self.window_len {
            let beg = self.i_slice.saturating_sub(self.window_len);
            let end = curr_i_slice - self.window_len;

            for j in beg..end {
                let history = self.loader.slice_at(j)?;
                for r in history.iter() {
                    *self.counts.entry(r.content_id).or_insert(0) -= 1;
                }
                self.history_num_requests -= history.len() as i64;
            }

            self.i_slice = curr_i_slice;
        }
        Ok(())
    }
}

impl FeatureExtractor for SwLfuFeature {
    fn name(&self) -> &'static str {
        "SW-LFU"
    }

    fn reset(&mut self) {
        tracing::debug!(window_len = self.window_len, "SwLfuFeature reset");
        self.counts.clear();
        self.history_num_requests = 0;
        self.i_slice = 0;
    }

    fn update(&mut self, slice: &Slice<'_>) -> Result<(), EmuError> {
        for r in slice.iter() {
            *self.counts.entry(r.content_id).or_insert(0) += 1;
        }
        self.history_num_requests += slice.len() as i64;

        if let Some(last) = slice.last() {
            self.expire_history(last.timestamp)?;
        }
        Ok(())
    }

    fn features(&mut self, contents: &[Content]) -> &FeatureMatrix {
        self.matrix.resize(contents.len(), 1);
        let denom = self.history_num_requests as f32 + EPS;
        for (i, &c) in contents.iter().enumerate() {
            let count = self.counts.get(&c).copied().unwrap_or(0);
            self.matrix.set(i, 0, count as f32 / denom);
        }
        &self.matrix
    }
}

impl core::fmt::Debug for SwLfuFeature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SwLfuFeature")
            .field("window_len", &self.window_len)
            .field("i_slice", &self.i_slice)
            .field("history_num_requests", &self.history_num_requests)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One slice per timestamp: s0=[1,1], s1=[2], s2=[3], s3=[4].
    fn window_loader() -> Arc<RequestLoader> {
        let mut l = RequestLoader::new();
        l.load_dataset(&[1, 1, 2, 3, 4], &[0, 0, 1, 2, 3]);
        l.slice_by_time(0, 4, 1);
        Arc::new(l)
    }

    fn feed(f: &mut SwLfuFeature, loader: &RequestLoader, i: usize) {
        let slice = loader.slice_at(i).unwrap();
        f.update(&slice).unwrap();
    }

    #[test]
    fn test_window_sum_matches_history() {
        let loader = window_loader();
        let mut f = SwLfuFeature::new(2, Arc::clone(&loader));

        for i in 0..4 {
            feed(&mut f, &loader, i);
            let sum: i64 = f.counts.values().sum();
            assert_eq!(sum, f.history_num_requests());
        }
    }

    #[test]
    fn test_expiry_after_window_passes() {
        let loader = window_loader();
        let mut f = SwLfuFeature::new(2, Arc::clone(&loader));

        for i in 0..4 {
            feed(&mut f, &loader, i);
        }

        // s0 and s1 have left the two-slice window ending at s3.
        assert_eq!(f.count(1), 0);
        assert_eq!(f.count(2), 1);
        assert_eq!(f.count(3), 1);
        assert_eq!(f.count(4), 1);
        assert_eq!(f.history_num_requests(), 3);
    }

    #[test]
    fn test_feature_is_normalized_count() {
        let loader = window_loader();
        let mut f = SwLfuFeature::new(2, Arc::clone(&loader));
        feed(&mut f, &loader, 0);

        let m = f.features(&[1, 9]);
        assert!((m.get(0, 0) - 1.0).abs() < 1e-3); // 2 / (2 + eps)
        assert_eq!(m.get(1, 0), 0.0);
    }

    #[test]
    fn test_reset() {
        let loader = window_loader();
        let mut f = SwLfuFeature::new(2, Arc::clone(&loader));
        feed(&mut f, &loader, 0);
        f.reset();
        assert_eq!(f.history_num_requests(), 0);
        assert_eq!(f.count(1), 0);
    }
}

//! Feature extraction.
//!
//! A feature extractor turns trace history into one number per queried
//! content. Extractors are fed every processed slice through `update` and
//! queried in bulk through `features`, which fills a row-major
//! [`FeatureMatrix`] (one row per queried content, one column per feature
//! dimension; every extractor defined here contributes a single column).
//!
//! The [`FeatureManager`] owns an ordered list of extractors and
//! concatenates their outputs column-wise:
//!
//! ```text
//!                 LFU   LRU   OGD-Opt
//! content 17   [ 3.0, -2.0,  0.41 ]
//! content  5   [ 1.0,  0.0,  0.08 ]
//! content 99   [ 0.0, -7.0,  0.00 ]
//! ```
//!
//! Output buffers are reused across calls; a returned matrix is valid until
//! the next call on the same extractor or manager.
//!
//! | Extractor | Feature per content `c` | State |
//! |-----------|-------------------------|-------|
//! | [`IdFeature`] | `c` itself | none |
//! | [`LruFeature`] | `-(latest - last_seen(c))` | last-seen table |
//! | [`LfuFeature`] | total access count | count table |
//! | [`SwLfuFeature`] | windowed count / window total | count table + window |
//! | [`OgdFeature`] | online-gradient-descent weight | weight table + min-heap |

pub mod id;
pub mod lfu;
pub mod lru;
pub mod ogd;
pub mod swlfu;

pub use id::IdFeature;
pub use lfu::LfuFeature;
pub use lru::LruFeature;
pub use ogd::OgdFeature;
pub use swlfu::SwLfuFeature;

use crate::error::EmuError;
use crate::trace::{Content, Slice};

/// Dense row-major `(content_dims x feature_dims)` matrix of feature values.
#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
    data: Vec<f32>,
    content_dims: usize,
    feature_dims: usize,
}

impl FeatureMatrix {
    /// Creates an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reshapes to `(content_dims x feature_dims)`, zeroing every cell. The
    /// allocation is reused when possible.
    pub fn resize(&mut self, content_dims: usize, feature_dims: usize) {
        self.content_dims = content_dims;
        self.feature_dims = feature_dims;
        self.data.clear();
        self.data.resize(content_dims * feature_dims, 0.0);
    }

    /// `(content_dims, feature_dims)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.content_dims, self.feature_dims)
    }

    /// Number of feature columns.
    #[inline]
    pub fn feature_dims(&self) -> usize {
        self.feature_dims
    }

    /// Value at `(c_dim, f_dim)`.
    #[inline]
    pub fn get(&self, c_dim: usize, f_dim: usize) -> f32 {
        self.data[c_dim * self.feature_dims + f_dim]
    }

    /// Writes `value` at `(c_dim, f_dim)`.
    #[inline]
    pub fn set(&mut self, c_dim: usize, f_dim: usize, value: f32) {
        self.data[c_dim * self.feature_dims + f_dim] = value;
    }

    /// The matrix as a flat row-major slice.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Common contract of every feature extractor.
///
/// `Send` is required so emulators owning extractors can live in the
/// process-wide registry.
pub trait FeatureExtractor: Send {
    /// Extractor name, for logs and debug output.
    fn name(&self) -> &'static str;

    /// Number of feature columns this extractor produces.
    fn feature_dims(&self) -> usize {
        1
    }

    /// Drops all accumulated state.
    fn reset(&mut self);

    /// Feeds one processed slice of the trace, in order.
    fn update(&mut self, slice: &Slice<'_>) -> Result<(), EmuError>;

    /// Features of `contents`, one row each, in a buffer reused across
    /// calls.
    fn features(&mut self, contents: &[Content]) -> &FeatureMatrix;
}

/// Ordered composition of feature extractors.
///
/// `feature_dims` is the sum over extractors; `update` forwards to each in
/// installation order; `features` concatenates the per-extractor columns
/// into a single reused matrix.
#[derive(Default)]
pub struct FeatureManager {
    extractors: Vec<Box<dyn FeatureExtractor>>,
    matrix: FeatureMatrix,
    feature_dims: usize,
}

impl FeatureManager {
    /// Creates a manager with no extractors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an extractor; its columns follow all previously installed
    /// ones.
    pub fn add_extractor(&mut self, extractor: Box<dyn FeatureExtractor>) {
        self.feature_dims += extractor.feature_dims();
        self.extractors.push(extractor);
    }

    /// Total number of feature columns.
    #[inline]
    pub fn feature_dims(&self) -> usize {
        self.feature_dims
    }

    /// Number of installed extractors.
    #[inline]
    pub fn num_extractors(&self) -> usize {
        self.extractors.len()
    }

    /// Resets every installed extractor (the set of extractors is kept).
    pub fn reset(&mut self) {
        tracing::debug!("feature manager reset");
        for e in &mut self.extractors {
            e.reset();
        }
    }

    /// Feeds one processed slice to every extractor.
    pub fn update(&mut self, slice: &Slice<'_>) -> Result<(), EmuError> {
        for e in &mut self.extractors {
            e.update(slice)?;
        }
        Ok(())
    }

    /// Concatenated `(contents.len() x feature_dims)` feature matrix.
    pub fn features(&mut self, contents: &[Content]) -> &FeatureMatrix {
        self.matrix.resize(contents.len(), self.feature_dims);

        let mut col = 0;
        for e in &mut self.extractors {
            let f = e.features(contents);
            let dims = f.feature_dims();
            for row in 0..contents.len() {
                for j in 0..dims {
                    self.matrix.set(row, col + j, f.get(row, j));
                }
            }
            col += dims;
        }

        &self.matrix
    }
}

impl core::fmt::Debug for FeatureManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeatureManager")
            .field("feature_dims", &self.feature_dims)
            .field(
                "extractors",
                &self
                    .extractors
                    .iter()
                    .map(|e| e.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Request;

    #[test]
    fn test_matrix_resize_and_index() {
        let mut m = FeatureMatrix::new();
        m.resize(2, 3);
        assert_eq!(m.shape(), (2, 3));
        m.set(1, 2, 7.0);
        assert_eq!(m.get(1, 2), 7.0);
        assert_eq!(m.as_slice(), &[0.0, 0.0, 0.0, 0.0, 0.0, 7.0]);

        // Reshaping zeroes previous contents.
        m.resize(1, 3);
        assert_eq!(m.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_manager_concatenates_columns() {
        let mut mgr = FeatureManager::new();
        mgr.add_extractor(Box::new(IdFeature::new()));
        mgr.add_extractor(Box::new(LfuFeature::new()));
        assert_eq!(mgr.feature_dims(), 2);

        let reqs = [Request::new(5, 0), Request::new(5, 0), Request::new(9, 1)];
        mgr.update(&Slice::new(&reqs)).unwrap();

        let m = mgr.features(&[5, 9, 1]);
        assert_eq!(m.shape(), (3, 2));
        // Column 0: id, column 1: access count.
        assert_eq!(m.as_slice(), &[5.0, 2.0, 9.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_manager_reset_keeps_extractors() {
        let mut mgr = FeatureManager::new();
        mgr.add_extractor(Box::new(LfuFeature::new()));

        let reqs = [Request::new(1, 0)];
        mgr.update(&Slice::new(&reqs)).unwrap();
        mgr.reset();

        assert_eq!(mgr.num_extractors(), 1);
        assert_eq!(mgr.features(&[1]).as_slice(), &[0.0]);
    }
}

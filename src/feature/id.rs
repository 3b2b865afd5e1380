//! Identity feature: the content id itself, as a float.

use crate::error::EmuError;
use crate::feature::{FeatureExtractor, FeatureMatrix};
use crate::trace::{Content, Slice};

/// Stateless extractor whose feature for content `c` is `c`.
#[derive(Debug, Default)]
pub struct IdFeature {
    matrix: FeatureMatrix,
}

impl IdFeature {
    /// Creates the extractor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureExtractor for IdFeature {
    fn name(&self) -> &'static str {
        "Id"
    }

    fn reset(&mut self) {}

    fn update(&mut self, _slice: &Slice<'_>) -> Result<(), EmuError> {
        Ok(())
    }

    fn features(&mut self, contents: &[Content]) -> &FeatureMatrix {
        self.matrix.resize(contents.len(), 1);
        for (i, &c) in contents.iter().enumerate() {
            self.matrix.set(i, 0, c as f32);
        }
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_feature_is_the_content() {
        let mut f = IdFeature::new();
        let m = f.features(&[3, -1, 1000]);
        assert_eq!(m.as_slice(), &[3.0, -1.0, 1000.0]);
    }
}

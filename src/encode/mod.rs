pub mod layout;
pub mod words;

pub use layout::{encode_layout, rasterize, LayoutGrid, TOLERANCE};
pub use words::encode_words;

use crate::core::model::{LayoutShape, Word};
use crate::core::vocabulary::Vocabulary;
use crate::error::Result;

/// Turns OCR words into the `vocabulary ++ layout grid` feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    vocabulary: Vocabulary,
    shape: LayoutShape,
}

impl FeatureEncoder {
    pub fn new(vocabulary: Vocabulary, shape: LayoutShape) -> Self {
        Self { vocabulary, shape }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn shape(&self) -> LayoutShape {
        self.shape
    }

    /// Length of every vector produced by [`FeatureEncoder::encode`].
    pub fn num_features(&self) -> usize {
        self.vocabulary.len() + self.shape.cells()
    }

    pub fn encode_words(&self, words: &[Word]) -> Vec<f64> {
        encode_words(words, &self.vocabulary)
    }

    pub fn encode_layout(&self, words: &[Word]) -> Result<LayoutGrid> {
        encode_layout(words, self.shape)
    }

    pub fn encode(&self, words: &[Word]) -> Result<Vec<f64>> {
        let mut features = Vec::with_capacity(self.num_features());
        features.extend(self.encode_words(words));
        features.extend(self.encode_layout(words)?.into_vec());
        Ok(features)
    }
}

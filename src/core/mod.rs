pub mod geometry;
pub mod model;
pub mod vocabulary;

pub use geometry::BBox;
pub use model::{LayoutShape, Prediction, Word};
pub use vocabulary::{
    build_balanced_vocabulary, build_global_vocabulary, Vocabulary, VocabularyPolicy,
};

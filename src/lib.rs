pub mod core;
pub mod encode;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod ocr;
pub mod pipeline;
pub mod routing;

pub use core::model::{LayoutShape, Prediction, Word};
pub use core::vocabulary::{Vocabulary, VocabularyPolicy};
pub use encode::FeatureEncoder;
pub use error::{Result, RoutingError};
pub use routing::{ModelSource, RoutingModel};

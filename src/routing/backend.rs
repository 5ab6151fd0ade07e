use serde::{Deserialize, Serialize};

use crate::core::model::Prediction;
use crate::error::{Result, RoutingError};
use crate::routing::forest::LayoutForest;

/// A runnable classifier over encoded feature vectors.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<Prediction>;
}

/// A trained model that can be exported into a persistable backend.
pub trait ExportClassifier {
    fn export(&self, num_features: usize) -> Result<ClassifierBackend>;
}

/// Format of the serialized classifier blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// ONNX inference graph; documents without a backend tag use this.
    #[default]
    Onnx,
    /// Native PCA + decision-tree ensemble.
    Forest,
}

/// Serialized classifier, kept as bytes until an inference session is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierBackend {
    kind: BackendKind,
    blob: Vec<u8>,
}

impl ClassifierBackend {
    pub fn new(kind: BackendKind, blob: Vec<u8>) -> Self {
        Self { kind, blob }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Builds the runnable classifier for this blob.
    ///
    /// `layouts` names the classes for graphs that emit class indices.
    pub fn materialize(&self, num_features: usize, layouts: &[String]) -> Result<Box<dyn Classifier>> {
        match self.kind {
            BackendKind::Forest => {
                let model = LayoutForest::from_blob(&self.blob)?;
                if model.num_features() != num_features {
                    return Err(RoutingError::Decode(format!(
                        "forest model expects {} features, encoder produces {}",
                        model.num_features(),
                        num_features
                    )));
                }
                Ok(Box::new(model))
            }
            BackendKind::Onnx => onnx_session(&self.blob, num_features, layouts),
        }
    }
}

#[cfg(feature = "onnx")]
fn onnx_session(
    blob: &[u8],
    num_features: usize,
    layouts: &[String],
) -> Result<Box<dyn Classifier>> {
    let session = crate::routing::onnx::OnnxClassifier::from_bytes(blob, num_features, layouts)?;
    Ok(Box::new(session))
}

#[cfg(not(feature = "onnx"))]
fn onnx_session(
    _blob: &[u8],
    _num_features: usize,
    _layouts: &[String],
) -> Result<Box<dyn Classifier>> {
    Err(RoutingError::Inference(
        "model uses an ONNX classifier; rebuild with the `onnx` feature".to_string(),
    ))
}

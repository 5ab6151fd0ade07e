pub mod backend;
pub mod document;
pub mod forest;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use backend::{BackendKind, Classifier, ClassifierBackend, ExportClassifier};
pub use document::{ModelDocument, ModelSource};
pub use forest::{ForestParams, LayoutForest};

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;

use crate::core::model::{LayoutShape, Prediction, Word};
use crate::core::vocabulary::Vocabulary;
use crate::encode::FeatureEncoder;
use crate::error::{Result, RoutingError};

/// Vocabulary, layout shape and a trained classifier bound together.
///
/// The runnable classifier is created on first use and then reused for the
/// lifetime of the model; creation happens at most once even when the model
/// is shared between threads.
pub struct RoutingModel {
    encoder: FeatureEncoder,
    tags: BTreeMap<String, String>,
    layouts: Vec<String>,
    backend: Option<ClassifierBackend>,
    session: OnceLock<Box<dyn Classifier>>,
    init: Mutex<()>,
}

impl RoutingModel {
    pub fn new(
        vocabulary: Vocabulary,
        shape: LayoutShape,
        tags: BTreeMap<String, String>,
        layouts: Vec<String>,
        backend: Option<ClassifierBackend>,
    ) -> Self {
        let mut unique = Vec::with_capacity(layouts.len());
        for layout in layouts {
            if !unique.contains(&layout) {
                unique.push(layout);
            }
        }

        Self {
            encoder: FeatureEncoder::new(vocabulary, shape),
            tags,
            layouts: unique,
            backend,
            session: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Wraps a freshly trained classifier, exporting it right away.
    pub fn from_trained<C>(
        classifier: &C,
        vocabulary: Vocabulary,
        shape: LayoutShape,
        tags: BTreeMap<String, String>,
        layouts: Vec<String>,
    ) -> Result<Self>
    where
        C: ExportClassifier + ?Sized,
    {
        let num_features = vocabulary.len() + shape.cells();
        let backend = classifier.export(num_features)?;
        Ok(Self::new(vocabulary, shape, tags, layouts, Some(backend)))
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.encoder.vocabulary()
    }

    pub fn shape(&self) -> LayoutShape {
        self.encoder.shape()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn layouts(&self) -> &[String] {
        &self.layouts
    }

    pub fn backend(&self) -> Option<&ClassifierBackend> {
        self.backend.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.session.get().is_some()
    }

    /// Creates the inference session if it does not exist yet.
    pub fn ensure_ready(&self) -> Result<&dyn Classifier> {
        if let Some(session) = self.session.get() {
            return Ok(session.as_ref());
        }

        let _guard = self.init.lock();
        if self.session.get().is_none() {
            let backend = self.backend.as_ref().ok_or_else(|| {
                RoutingError::Inference("routing model has no classifier backend".to_string())
            })?;
            let session = backend.materialize(self.encoder.num_features(), &self.layouts)?;
            tracing::info!(
                backend = ?backend.kind(),
                features = self.encoder.num_features(),
                "created inference session"
            );
            let _ = self.session.set(session);
        }

        self.session
            .get()
            .map(|session| session.as_ref())
            .ok_or_else(|| RoutingError::Inference("inference session unavailable".to_string()))
    }

    /// Encodes `words` and runs the classifier.
    pub fn classify_with_probability(&self, words: &[Word]) -> Result<Prediction> {
        let features = self.encoder.encode(words)?;
        let classifier = self.ensure_ready()?;
        let prediction = classifier.predict(&features)?;
        tracing::debug!(label = %prediction.label, probability = prediction.probability, "classified page");
        Ok(prediction)
    }

    pub fn classify(&self, words: &[Word]) -> Result<String> {
        self.classify_with_probability(words)
            .map(|prediction| prediction.label)
    }

    pub fn serialize(&self) -> Result<ModelDocument> {
        let backend = self.backend.as_ref().ok_or_else(|| {
            RoutingError::InvalidInput("cannot serialize a model without a classifier".to_string())
        })?;

        Ok(ModelDocument {
            tags: self.tags.clone(),
            layouts: self.layouts.clone(),
            vocabulary: Some(self.vocabulary().words().to_vec()),
            shape: Some(self.shape().into()),
            onnx_model: Some(STANDARD.encode(backend.blob())),
            backend: backend.kind(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        self.serialize()?.to_json()
    }

    /// Writes the model document to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)?;
        tracing::info!(path = %path.display(), "saved routing model");
        Ok(())
    }

    pub fn deserialize(source: &ModelSource) -> Result<Self> {
        Self::from_document(source.read()?)
    }

    pub fn from_document(document: ModelDocument) -> Result<Self> {
        let words = document
            .vocabulary
            .ok_or_else(|| RoutingError::Format("missing required field `vocabulary`".to_string()))?;
        let [rows, cols] = document
            .shape
            .ok_or_else(|| RoutingError::Format("missing required field `shape`".to_string()))?;
        let encoded = document
            .onnx_model
            .ok_or_else(|| RoutingError::Format("missing required field `onnxModel`".to_string()))?;

        let vocabulary = Vocabulary::new(words)?;
        let shape = LayoutShape::new(rows, cols)
            .map_err(|e| RoutingError::Format(e.to_string()))?;
        let blob = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| RoutingError::Decode(e.to_string()))?;

        Ok(Self::new(
            vocabulary,
            shape,
            document.tags,
            document.layouts,
            Some(ClassifierBackend::new(document.backend, blob)),
        ))
    }
}

impl fmt::Debug for RoutingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingModel")
            .field("vocabulary", &self.vocabulary().len())
            .field("shape", &self.shape())
            .field("tags", &self.tags)
            .field("layouts", &self.layouts)
            .field("backend", &self.backend.as_ref().map(ClassifierBackend::kind))
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(words: &[(&str, i64, i64, i64, i64)]) -> Vec<Word> {
        words
            .iter()
            .map(|&(text, left, right, top, bottom)| Word::new(text, left, right, top, bottom))
            .collect()
    }

    fn invoice_page() -> Vec<Word> {
        page(&[
            ("invoice", 0, 40, 0, 10),
            ("total", 60, 100, 90, 100),
        ])
    }

    fn receipt_page() -> Vec<Word> {
        page(&[
            ("receipt", 30, 70, 0, 10),
            ("cash", 30, 70, 40, 60),
            ("total", 30, 70, 90, 100),
        ])
    }

    fn trained_model() -> RoutingModel {
        let vocabulary =
            Vocabulary::new(vec!["cash".into(), "invoice".into(), "receipt".into(), "total".into()])
                .unwrap();
        let shape = LayoutShape::new(3, 3).unwrap();
        let encoder = FeatureEncoder::new(vocabulary.clone(), shape);
        let features = vec![
            encoder.encode(&invoice_page()).unwrap(),
            encoder.encode(&receipt_page()).unwrap(),
        ];
        let classifier =
            LayoutForest::fit(&features, &["invoice", "receipt"], vocabulary.len()).unwrap();
        let tags = BTreeMap::from([("creation_time".to_string(), "2024-01-01".to_string())]);
        RoutingModel::from_trained(
            &classifier,
            vocabulary,
            shape,
            tags,
            vec!["invoice".into(), "receipt".into()],
        )
        .unwrap()
    }

    #[test]
    fn classifies_training_pages() {
        let model = trained_model();
        assert!(!model.is_ready());
        assert_eq!(model.classify(&invoice_page()).unwrap(), "invoice");
        assert!(model.is_ready());
        let prediction = model.classify_with_probability(&receipt_page()).unwrap();
        assert_eq!(prediction.label, "receipt");
        assert!(prediction.probability > 0.5);
    }

    #[test]
    fn round_trip_preserves_model() {
        let model = trained_model();
        let restored =
            RoutingModel::deserialize(&ModelSource::InlineJson(model.to_json().unwrap())).unwrap();

        assert_eq!(restored.vocabulary(), model.vocabulary());
        assert_eq!(restored.shape(), model.shape());
        assert_eq!(restored.tags(), model.tags());
        assert_eq!(restored.layouts(), model.layouts());
        assert!(!restored.is_ready());

        for words in [invoice_page(), receipt_page()] {
            assert_eq!(
                restored.classify_with_probability(&words).unwrap(),
                model.classify_with_probability(&words).unwrap()
            );
        }
    }

    #[test]
    fn document_uses_the_persisted_key_names() {
        let json = trained_model().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for key in ["tags", "layouts", "vocabulary", "shape", "onnxModel", "backend"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["shape"], serde_json::json!([3, 3]));
        assert_eq!(value["backend"], serde_json::json!("forest"));
    }

    #[test]
    fn missing_shape_is_a_format_error() {
        let json = r#"{"vocabulary": ["a"], "onnxModel": "AAEC"}"#;
        let result = RoutingModel::deserialize(&ModelSource::InlineJson(json.to_string()));
        assert!(matches!(result, Err(RoutingError::Format(_))));
    }

    #[test]
    fn overflowing_shape_is_a_format_error() {
        let json = r#"{"vocabulary": ["a"], "shape": [18446744073709551615, 2], "onnxModel": "AAEC"}"#;
        let result = RoutingModel::deserialize(&ModelSource::InlineJson(json.to_string()));
        assert!(matches!(result, Err(RoutingError::Format(_))), "{result:?}");
    }

    #[test]
    fn missing_vocabulary_is_a_format_error() {
        let json = r#"{"shape": [2, 2], "onnxModel": "AAEC"}"#;
        let result = RoutingModel::deserialize(&ModelSource::InlineJson(json.to_string()));
        assert!(matches!(result, Err(RoutingError::Format(_))));
    }

    #[test]
    fn corrupt_blob_is_a_decode_error() {
        let json = r#"{"vocabulary": [], "shape": [2, 2], "onnxModel": "not base64!"}"#;
        let result = RoutingModel::deserialize(&ModelSource::InlineJson(json.to_string()));
        assert!(matches!(result, Err(RoutingError::Decode(_))));
    }

    #[test]
    fn braces_in_a_path_are_not_json() {
        let source = ModelSource::FilePath("{weird}".into());
        assert!(matches!(
            RoutingModel::deserialize(&source),
            Err(RoutingError::Io(_))
        ));
    }

    #[test]
    fn classify_without_backend_fails() {
        let model = RoutingModel::new(
            Vocabulary::default(),
            LayoutShape::new(2, 2).unwrap(),
            BTreeMap::new(),
            Vec::new(),
            None,
        );
        let result = model.classify(&invoice_page());
        assert!(matches!(result, Err(RoutingError::Inference(_))));
    }

    #[test]
    fn layouts_keep_first_occurrence_order() {
        let model = RoutingModel::new(
            Vocabulary::default(),
            LayoutShape::new(1, 1).unwrap(),
            BTreeMap::new(),
            vec!["b".into(), "a".into(), "b".into()],
            None,
        );
        assert_eq!(model.layouts(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn session_is_shared_across_threads() {
        let model = trained_model();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    assert_eq!(model.classify(&receipt_page()).unwrap(), "receipt");
                });
            }
        });
        assert!(model.is_ready());
    }
}

//! ONNX Runtime backend for classifiers exported from other toolchains.

use std::borrow::Cow;

use ort::logging::LogLevel;
use ort::memory::Allocator;
use ort::session::{Session, SessionInputs};
use ort::value::{DynMapValueType, DynValue, TensorRef, ValueType};
use parking_lot::Mutex;

use crate::core::model::Prediction;
use crate::error::{Result, RoutingError};
use crate::routing::backend::Classifier;

/// Classifier backed by an in-memory ONNX Runtime session.
///
/// The graph takes a `[1, N]` float input. The first output is the label
/// (string or int64 tensor). The optional second output holds the class
/// probabilities, either as a sequence of `{label: probability}` maps (the
/// ZipMap output of converted scikit-learn pipelines) or as a `[1, classes]`
/// float tensor ordered like the sorted class labels.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    label_output: String,
    probability_output: Option<String>,
    classes: Vec<String>,
    num_features: usize,
}

impl OnnxClassifier {
    pub fn from_bytes(blob: &[u8], num_features: usize, layouts: &[String]) -> Result<Self> {
        let session = Session::builder()
            .and_then(|builder| builder.with_log_level(LogLevel::Error))
            .and_then(|builder| builder.commit_from_memory(blob))
            .map_err(|e| RoutingError::Decode(format!("failed to create ONNX session: {e}")))?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| RoutingError::Decode("ONNX graph declares no inputs".to_string()))?;
        let outputs: Vec<String> = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();
        let label_output = outputs
            .first()
            .cloned()
            .ok_or_else(|| RoutingError::Decode("ONNX graph declares no outputs".to_string()))?;

        let mut classes = layouts.to_vec();
        classes.sort();

        tracing::debug!(%input_name, ?outputs, num_features, "created ONNX session");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            label_output,
            probability_output: outputs.get(1).cloned(),
            classes,
            num_features,
        })
    }
}

enum RawLabel {
    Name(String),
    Index(i64),
}

fn read_label(value: &DynValue, name: &str) -> Result<RawLabel> {
    let empty = || RoutingError::Inference(format!("label output '{name}' is empty"));
    if let Ok((_, labels)) = value.try_extract_strings() {
        return labels.into_iter().next().map(RawLabel::Name).ok_or_else(empty);
    }
    if let Ok((_, labels)) = value.try_extract_tensor::<i64>() {
        return labels.first().map(|&i| RawLabel::Index(i)).ok_or_else(empty);
    }
    Err(RoutingError::Inference(format!(
        "label output '{name}' is neither a string nor an int64 tensor"
    )))
}

impl OnnxClassifier {
    fn class_index(&self, label: &RawLabel) -> Option<usize> {
        match label {
            RawLabel::Name(name) => self.classes.iter().position(|c| c == name),
            RawLabel::Index(index) => usize::try_from(*index).ok(),
        }
    }

    fn read_probability(&self, value: &DynValue, name: &str, label: &RawLabel) -> Result<f64> {
        let unreadable = |e: ort::Error| {
            RoutingError::Inference(format!("cannot read probability output '{name}': {e}"))
        };

        if let ValueType::Sequence(_) = value.dtype() {
            let maps = value
                .try_extract_sequence::<DynMapValueType>(&Allocator::default())
                .map_err(unreadable)?;
            let first = maps.first().ok_or_else(|| {
                RoutingError::Inference(format!("probability output '{name}' is empty"))
            })?;
            let score = match label {
                RawLabel::Name(label) => first
                    .try_extract_map::<String, f32>()
                    .map_err(unreadable)?
                    .get(label)
                    .copied(),
                RawLabel::Index(label) => first
                    .try_extract_map::<i64, f32>()
                    .map_err(unreadable)?
                    .get(label)
                    .copied(),
            };
            return score.map(f64::from).ok_or_else(|| {
                RoutingError::Inference(format!(
                    "probability output '{name}' has no entry for the predicted label"
                ))
            });
        }

        let (_, scores) = value.try_extract_tensor::<f32>().map_err(unreadable)?;
        Ok(match self.class_index(label).and_then(|i| scores.get(i)) {
            Some(score) => f64::from(*score),
            None => scores.iter().copied().fold(0.0_f32, f32::max).into(),
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        if features.len() != self.num_features {
            return Err(RoutingError::Inference(format!(
                "got {} features, model expects {}",
                features.len(),
                self.num_features
            )));
        }

        let data: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let dims = vec![1_i64, data.len() as i64];
        let tensor = TensorRef::from_array_view((dims, data.as_slice()))
            .map_err(|e| RoutingError::Inference(format!("failed to build input tensor: {e}")))?;

        let mut session = self.session.lock();
        let inputs: SessionInputs<'_, '_, 0> =
            SessionInputs::ValueMap(vec![(Cow::Borrowed(self.input_name.as_str()), tensor.into())]);
        let outputs = session
            .run(inputs)
            .map_err(|e| RoutingError::Inference(format!("ONNX Runtime run failed: {e}")))?;

        let label = read_label(&outputs[self.label_output.as_str()], &self.label_output)?;
        let probability = match &self.probability_output {
            Some(name) => self.read_probability(&outputs[name.as_str()], name, &label)?,
            None => 1.0,
        };
        let label = match label {
            RawLabel::Name(name) => name,
            RawLabel::Index(index) => usize::try_from(index)
                .ok()
                .and_then(|i| self.classes.get(i).cloned())
                .unwrap_or_else(|| index.to_string()),
        };

        Ok(Prediction { label, probability })
    }
}

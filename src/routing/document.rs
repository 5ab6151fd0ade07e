use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};
use crate::routing::backend::BackendKind;

/// On-disk JSON form of a routing model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub layouts: Vec<String>,
    pub vocabulary: Option<Vec<String>>,
    pub shape: Option<[usize; 2]>,
    /// Base64 classifier blob; the key name predates non-ONNX backends.
    #[serde(rename = "onnxModel")]
    pub onnx_model: Option<String>,
    #[serde(default)]
    pub backend: BackendKind,
}

impl ModelDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RoutingError::Format(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RoutingError::Format(e.to_string()))
    }
}

/// Where a persisted model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    InlineJson(String),
    FilePath(PathBuf),
}

impl ModelSource {
    pub fn read(&self) -> Result<ModelDocument> {
        match self {
            ModelSource::InlineJson(json) => ModelDocument::from_json(json),
            ModelSource::FilePath(path) => {
                let json = fs::read_to_string(path)?;
                ModelDocument::from_json(&json)
            }
        }
    }
}

impl From<PathBuf> for ModelSource {
    fn from(path: PathBuf) -> Self {
        ModelSource::FilePath(path)
    }
}

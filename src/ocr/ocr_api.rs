use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::geometry::BBox;
use crate::core::model::Word;
use crate::ocr::OcrProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrApiResult {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub regions: Vec<OcrRegion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrRegion {
    #[serde(default)]
    pub lines: Vec<OcrLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrLine {
    #[serde(default)]
    pub words: Vec<OcrWord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    /// `"left,top,width,height"` in pixels
    #[serde(rename = "boundingBox")]
    pub bounding_box: String,
}

/// Synchronous Computer Vision OCR API results.
#[derive(Debug, Clone, Default)]
pub struct ComputerVisionOcr;

impl ComputerVisionOcr {
    pub fn new() -> Self {
        Self
    }
}

fn parse_bounding_box(value: &str) -> Result<BBox> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid bounding box '{value}'"))?;
    match numbers.as_slice() {
        &[left, top, width, height] => Ok(BBox::from_ltwh(left, top, width, height)),
        _ => anyhow::bail!("bounding box '{value}' must have 4 numbers"),
    }
}

impl OcrProvider for ComputerVisionOcr {
    type Raw = OcrApiResult;

    fn cache_suffix(&self) -> &'static str {
        ".acv.ocr.json"
    }

    fn words_from_result(&self, raw: &OcrApiResult) -> Result<Vec<Word>> {
        let mut words = Vec::new();
        for word in raw
            .regions
            .iter()
            .flat_map(|region| &region.lines)
            .flat_map(|line| &line.words)
        {
            let bbox = parse_bounding_box(&word.bounding_box)?;
            words.push(Word::new(
                word.text.clone(),
                bbox.left,
                bbox.right,
                bbox.top,
                bbox.bottom,
            ));
        }
        Ok(words)
    }
}

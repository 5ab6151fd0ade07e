use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::model::Word;
use crate::ocr::OcrProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadApiResult {
    pub status: String,
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub read_results: Vec<ReadPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadPage {
    /// `pixel` for images, `inch` for PDF input.
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub lines: Vec<ReadLine>,
}

impl ReadPage {
    /// Factor that brings this page's coordinates to pixels.
    fn scale(&self) -> f64 {
        match self.unit.as_deref() {
            Some("inch") => PIXELS_PER_INCH,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadLine {
    #[serde(default)]
    pub words: Vec<ReadWord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadWord {
    pub text: String,
    /// Four corners clockwise from top-left: `[x1, y1, ..., x4, y4]`.
    #[serde(rename = "boundingBox")]
    pub bounding_box: Vec<f64>,
}

/// Asynchronous Computer Vision Read API results (all pages).
#[derive(Debug, Clone, Default)]
pub struct ComputerVisionRead;

impl ComputerVisionRead {
    pub fn new() -> Self {
        Self
    }
}

/// Inch coordinates (PDF pages) are rasterized at this resolution before
/// rounding to integer word boxes.
pub const PIXELS_PER_INCH: f64 = 300.0;

fn extent(values: impl Iterator<Item = f64>, scale: f64) -> (i64, i64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    ((min * scale).round() as i64, (max * scale).round() as i64)
}

impl OcrProvider for ComputerVisionRead {
    type Raw = ReadApiResult;

    fn cache_suffix(&self) -> &'static str {
        ".acv.read.json"
    }

    fn words_from_result(&self, raw: &ReadApiResult) -> Result<Vec<Word>> {
        if raw.status != "succeeded" {
            anyhow::bail!("Read API result has status '{}'", raw.status);
        }
        let Some(analyze) = &raw.analyze_result else {
            anyhow::bail!("Read API result has no analyzeResult");
        };

        let mut words = Vec::new();
        for (scale, word) in analyze.read_results.iter().flat_map(|page| {
            let scale = page.scale();
            page.lines
                .iter()
                .flat_map(|line| &line.words)
                .map(move |word| (scale, word))
        }) {
            if word.bounding_box.len() != 8 {
                anyhow::bail!(
                    "bounding box of '{}' has {} numbers, expected 8",
                    word.text,
                    word.bounding_box.len()
                );
            }
            let (left, right) = extent(word.bounding_box.iter().step_by(2).copied(), scale);
            let (top, bottom) = extent(word.bounding_box.iter().skip(1).step_by(2).copied(), scale);
            words.push(Word::new(word.text.clone(), left, right, top, bottom));
        }
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn uses_corner_extents() {
        let raw: ReadApiResult = serde_json::from_str(
            r#"{
                "status": "succeeded",
                "analyzeResult": {"readResults": [
                    {"page": 1, "lines": [{"text": "Due 12", "words": [
                        {"boundingBox": [10, 12, 52, 10, 53, 30, 11, 31], "text": "Due"},
                        {"boundingBox": [60, 10, 80, 10, 80, 30, 60, 30], "text": "12"}
                    ]}]},
                    {"page": 2, "lines": [{"text": "Total", "words": [
                        {"boundingBox": [5.4, 100.6, 40, 100, 40, 120, 5, 120], "text": "Total"}
                    ]}]}
                ]}
            }"#,
        )
        .unwrap();
        let words = ComputerVisionRead::new().words_from_result(&raw).unwrap();
        assert_eq!(
            words,
            vec![
                Word::new("Due", 10, 53, 10, 31),
                Word::new("12", 60, 80, 10, 30),
                Word::new("Total", 5, 40, 100, 120),
            ]
        );
    }

    #[test]
    fn inch_pages_are_scaled_to_pixels() {
        let raw: ReadApiResult = serde_json::from_str(
            r#"{
                "status": "succeeded",
                "analyzeResult": {"readResults": [
                    {"page": 1, "unit": "inch", "width": 8.5, "height": 11, "lines": [
                        {"text": "Due Total", "words": [
                            {"boundingBox": [1.01, 0.5, 1.4, 0.5, 1.4, 0.62, 1.01, 0.62], "text": "Due"},
                            {"boundingBox": [1.02, 0.5, 1.41, 0.5, 1.41, 0.63, 1.02, 0.63], "text": "Total"}
                        ]}
                    ]},
                    {"page": 2, "unit": "pixel", "lines": [{"text": "x", "words": [
                        {"boundingBox": [1, 2, 3, 2, 3, 4, 1, 4], "text": "x"}
                    ]}]}
                ]}
            }"#,
        )
        .unwrap();
        let words = ComputerVisionRead::new().words_from_result(&raw).unwrap();
        assert_eq!(
            words,
            vec![
                Word::new("Due", 303, 420, 150, 186),
                Word::new("Total", 306, 423, 150, 189),
                Word::new("x", 1, 3, 2, 4),
            ]
        );
    }

    #[test]
    fn failed_status_is_an_error() {
        let raw = ReadApiResult {
            status: "failed".to_string(),
            analyze_result: None,
        };
        let err = ComputerVisionRead::new().words_from_result(&raw).unwrap_err();
        assert!(err.to_string().contains("failed"));
    }
}

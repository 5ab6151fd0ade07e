pub mod ocr_api;
pub mod read_api;

pub use ocr_api::ComputerVisionOcr;
pub use read_api::ComputerVisionRead;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::core::model::Word;

/// Source of OCR words for an image.
///
/// Raw service responses are read from the result cache kept next to each
/// image (`<image><suffix>`); the network call that fills it lives outside
/// this crate.
pub trait OcrProvider {
    type Raw: DeserializeOwned;

    /// Suffix appended to the image path to find its cached response.
    fn cache_suffix(&self) -> &'static str;

    fn cache_path(&self, image: &Path) -> PathBuf {
        let mut name = OsString::from(image.as_os_str());
        name.push(self.cache_suffix());
        PathBuf::from(name)
    }

    fn raw_results(&self, image: &Path) -> Result<Self::Raw> {
        let path = self.cache_path(image);
        let data = fs::read_to_string(&path).with_context(|| {
            format!(
                "no cached OCR result for {} (expected {})",
                image.display(),
                path.display()
            )
        })?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse OCR result {}", path.display()))
    }

    fn words_from_result(&self, raw: &Self::Raw) -> Result<Vec<Word>>;

    fn ocr_results(&self, image: &Path) -> Result<Vec<Word>> {
        let raw = self.raw_results(image)?;
        let words = self.words_from_result(&raw)?;
        tracing::debug!(image = %image.display(), words = words.len(), "loaded OCR words");
        Ok(words)
    }
}

/// Which OCR response format to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProviderKind {
    /// Synchronous OCR API (`regions/lines/words`)
    #[default]
    Ocr,
    /// Asynchronous Read API (`analyzeResult/readResults`)
    Read,
}

impl ProviderKind {
    pub fn ocr_results(self, image: &Path) -> Result<Vec<Word>> {
        match self {
            ProviderKind::Ocr => ComputerVisionOcr::new().ocr_results(image),
            ProviderKind::Read => ComputerVisionRead::new().ocr_results(image),
        }
    }
}

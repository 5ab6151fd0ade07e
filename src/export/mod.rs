pub mod json_export;
pub mod text_export;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::evaluation::TrainingReport;

pub use json_export::JsonExporter;
pub use text_export::TextExporter;

pub trait Exporter {
    fn export(&self, report: &TrainingReport) -> Result<PathBuf>;
}

/// `models/invoices` + `.report.json` -> `models/invoices.report.json`
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

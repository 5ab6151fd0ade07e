use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::evaluation::TrainingReport;
use crate::export::{with_suffix, Exporter};

#[derive(Debug, Clone)]
pub struct JsonExporter {
    prefix: PathBuf,
}

impl JsonExporter {
    pub fn new(prefix: PathBuf) -> Self {
        Self { prefix }
    }
}

impl Exporter for JsonExporter {
    fn export(&self, report: &TrainingReport) -> Result<PathBuf> {
        let path = with_suffix(&self.prefix, ".report.json");
        let data = serde_json::to_string_pretty(report)?;
        fs::write(&path, data)?;
        Ok(path)
    }
}

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::evaluation::{ConfusionMatrix, TrainingReport};
use crate::export::{with_suffix, Exporter};

#[derive(Debug, Clone)]
pub struct TextExporter {
    prefix: PathBuf,
}

impl TextExporter {
    pub fn new(prefix: PathBuf) -> Self {
        Self { prefix }
    }

    pub fn render(report: &TrainingReport) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "Model: {}", report.model_name)?;
        writeln!(out, "Created: {}", report.created)?;
        writeln!(out, "Vocabulary: {} words", report.vocabulary_size)?;
        writeln!(out, "Layout shape: {}", report.shape)?;
        writeln!(out)?;

        writeln!(out, "Samples")?;
        for (layout, count) in &report.samples_per_layout {
            writeln!(out, "  {layout}: {count}")?;
        }
        if !report.skipped.is_empty() {
            writeln!(out, "  skipped (no words): {}", report.skipped.len())?;
        }
        writeln!(out)?;

        writeln!(
            out,
            "Hold-out: {} train / {} test",
            report.train_samples, report.test_samples
        )?;
        match report.accuracy {
            Some(accuracy) => writeln!(out, "Accuracy: {:.2}%", accuracy * 100.0)?,
            None => writeln!(out, "Accuracy: n/a (no test samples)")?,
        }
        writeln!(out)?;
        out.push_str(&Self::format_confusion(&report.confusion));
        Ok(out)
    }

    fn format_confusion(matrix: &ConfusionMatrix) -> String {
        let width = matrix
            .labels()
            .iter()
            .map(String::len)
            .chain(std::iter::once("actual \\ predicted".len()))
            .max()
            .unwrap_or(0);

        let mut out = format!("{:<width$}", "actual \\ predicted");
        for label in matrix.labels() {
            out.push_str(&format!(" {label:>width$}"));
        }
        out.push('\n');
        for (label, row) in matrix.labels().iter().zip(matrix.counts()) {
            out.push_str(&format!("{label:<width$}"));
            for count in row {
                out.push_str(&format!(" {count:>width$}"));
            }
            out.push('\n');
        }
        out
    }
}

impl Exporter for TextExporter {
    fn export(&self, report: &TrainingReport) -> Result<PathBuf> {
        let path = with_suffix(&self.prefix, ".report.txt");
        fs::write(&path, Self::render(report)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::core::model::LayoutShape;
    use crate::export::JsonExporter;

    fn report() -> TrainingReport {
        let mut confusion = ConfusionMatrix::new(&["invoice", "receipt"]);
        confusion.record("invoice", "invoice").unwrap();
        confusion.record("receipt", "invoice").unwrap();
        TrainingReport {
            model_name: "routing".to_string(),
            created: "2024-05-01T00:00:00+00:00".to_string(),
            layouts: vec!["invoice".to_string(), "receipt".to_string()],
            samples_per_layout: BTreeMap::from([
                ("invoice".to_string(), 2),
                ("receipt".to_string(), 2),
            ]),
            skipped: Vec::new(),
            vocabulary_size: 12,
            shape: LayoutShape::new(50, 50).unwrap(),
            train_samples: 2,
            test_samples: 2,
            accuracy: confusion.accuracy(),
            confusion,
        }
    }

    #[test]
    fn renders_accuracy_and_matrix() {
        let text = TextExporter::render(&report()).unwrap();
        assert!(text.contains("Layout shape: 50x50"));
        assert!(text.contains("Accuracy: 50.00%"));
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("receipt"));
        assert!(last.split_whitespace().eq(["receipt", "1", "0"]));
    }

    #[test]
    fn exporters_write_next_to_the_model() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let prefix = dir.path().join("routing");

        let json = JsonExporter::new(prefix.clone()).export(&report())?;
        let text = TextExporter::new(prefix).export(&report())?;

        assert_eq!(json, dir.path().join("routing.report.json"));
        assert_eq!(text, dir.path().join("routing.report.txt"));
        let restored: TrainingReport = serde_json::from_str(&fs::read_to_string(json)?)?;
        assert_eq!(restored, report());
        Ok(())
    }
}

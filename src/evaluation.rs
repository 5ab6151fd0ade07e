use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::model::LayoutShape;
use crate::error::{Result, RoutingError};

/// Splits sample indices into train and test halves, per label.
///
/// Samples of each label alternate between the halves in their original
/// order, starting with train, so every label with at least one sample is
/// present in the training half.
pub fn stratified_split<L: AsRef<str>>(labels: &[L]) -> (Vec<usize>, Vec<usize>) {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (index, label) in labels.iter().enumerate() {
        let count = seen.entry(label.as_ref()).or_default();
        if *count % 2 == 0 {
            train.push(index);
        } else {
            test.push(index);
        }
        *count += 1;
    }
    (train, test)
}

/// Counts of `(actual, predicted)` pairs; rows are actual labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new<L: AsRef<str>>(labels: &[L]) -> Self {
        let mut labels: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        labels.sort();
        labels.dedup();
        let counts = vec![vec![0; labels.len()]; labels.len()];
        Self { labels, counts }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    fn position(&self, label: &str) -> Result<usize> {
        self.labels
            .binary_search_by(|known| known.as_str().cmp(label))
            .map_err(|_| RoutingError::InvalidInput(format!("unknown layout '{label}'")))
    }

    pub fn record(&mut self, actual: &str, predicted: &str) -> Result<()> {
        let row = self.position(actual)?;
        let col = self.position(predicted)?;
        self.counts[row][col] += 1;
        Ok(())
    }

    pub fn get(&self, actual: &str, predicted: &str) -> Option<usize> {
        let row = self.position(actual).ok()?;
        let col = self.position(predicted).ok()?;
        Some(self.counts[row][col])
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }

    /// `None` when nothing has been recorded.
    pub fn accuracy(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.correct() as f64 / total as f64),
        }
    }
}

/// Summary of a training run, written next to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_name: String,
    pub created: String,
    pub layouts: Vec<String>,
    pub samples_per_layout: BTreeMap<String, usize>,
    pub skipped: Vec<String>,
    pub vocabulary_size: usize,
    pub shape: LayoutShape,
    pub train_samples: usize,
    pub test_samples: usize,
    pub accuracy: Option<f64>,
    pub confusion: ConfusionMatrix,
}

use linfa::traits::{Fit, Predict};
use linfa::{Dataset, DatasetBase};
use linfa_reduction::Pca;
use linfa_trees::DecisionTree;
use ndarray::{concatenate, s, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::model::Prediction;
use crate::error::{Result, RoutingError};
use crate::routing::backend::{BackendKind, Classifier, ClassifierBackend, ExportClassifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    pub trees: usize,
    /// Bounded so the JSON blob stays within serde_json's nesting limit.
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: 100,
            max_depth: 32,
            seed: 42,
        }
    }
}

/// PCA over the layout grid, word presence passed through, and a bagged
/// ensemble of decision trees on top.
///
/// Feature vectors are `[words.., layout cells..]`; the trees see
/// `[principal components.., words..]`. The reported probability is the
/// share of trees voting for the predicted class.
#[derive(Debug, Serialize, Deserialize)]
pub struct LayoutForest {
    classes: Vec<String>,
    word_features: usize,
    layout_features: usize,
    pca: Option<Pca<f64>>,
    trees: Vec<DecisionTree<f64, usize>>,
}

fn to_matrix(rows: &[Vec<f64>], width: usize) -> Result<Array2<f64>> {
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| RoutingError::InvalidInput(format!("ragged feature matrix: {e}")))
}

impl LayoutForest {
    pub fn fit<L: AsRef<str>>(
        features: &[Vec<f64>],
        labels: &[L],
        word_features: usize,
    ) -> Result<Self> {
        Self::fit_with(features, labels, word_features, ForestParams::default())
    }

    pub fn fit_with<L: AsRef<str>>(
        features: &[Vec<f64>],
        labels: &[L],
        word_features: usize,
        params: ForestParams,
    ) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(RoutingError::InvalidInput(format!(
                "{} samples but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let Some(first) = features.first() else {
            return Err(RoutingError::InvalidInput(
                "cannot fit a classifier without samples".to_string(),
            ));
        };
        let width = first.len();
        if word_features > width {
            return Err(RoutingError::InvalidInput(format!(
                "{word_features} word features but samples have only {width}"
            )));
        }
        if let Some(sample) = features.iter().find(|sample| sample.len() != width) {
            return Err(RoutingError::InvalidInput(format!(
                "sample has {} features, expected {width}",
                sample.len()
            )));
        }
        if params.trees == 0 {
            return Err(RoutingError::InvalidInput(
                "a forest needs at least one tree".to_string(),
            ));
        }

        let mut classes: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        let targets: Array1<usize> = labels
            .iter()
            .map(|label| {
                classes
                    .binary_search_by(|class| class.as_str().cmp(label.as_ref()))
                    .map_err(|_| RoutingError::InvalidInput("unknown label".to_string()))
            })
            .collect::<Result<_>>()?;

        let samples = features.len();
        let records = to_matrix(features, width)?;
        let layout = records.slice(s![.., word_features..]).to_owned();
        let components = (samples - 1).min(layout.ncols());
        let pca = if components > 0 {
            let pca = Pca::params(components)
                .fit(&DatasetBase::from(layout))
                .map_err(|e| RoutingError::InvalidInput(format!("PCA failed: {e}")))?;
            Some(pca)
        } else {
            None
        };

        let mut forest = Self {
            classes,
            word_features,
            layout_features: width - word_features,
            pca,
            trees: Vec::with_capacity(params.trees),
        };
        let transformed = forest.transform(&records)?;

        let mut rng = StdRng::seed_from_u64(params.seed);
        for _ in 0..params.trees {
            let picks: Vec<usize> = (0..samples).map(|_| rng.gen_range(0..samples)).collect();
            let bootstrap = Dataset::new(
                transformed.select(Axis(0), &picks),
                targets.select(Axis(0), &picks),
            );
            let tree = DecisionTree::params()
                .max_depth(Some(params.max_depth))
                .fit(&bootstrap)
                .map_err(|e| RoutingError::InvalidInput(format!("decision tree fit failed: {e}")))?;
            forest.trees.push(tree);
        }

        tracing::debug!(
            samples,
            classes = forest.classes.len(),
            components,
            trees = forest.trees.len(),
            "fitted layout forest"
        );
        Ok(forest)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_features(&self) -> usize {
        self.word_features + self.layout_features
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let forest: Self = serde_json::from_slice(blob)
            .map_err(|e| RoutingError::Decode(format!("invalid forest model: {e}")))?;
        if forest.classes.is_empty() || forest.trees.is_empty() {
            return Err(RoutingError::Decode(
                "forest model has no classes or no trees".to_string(),
            ));
        }
        Ok(forest)
    }

    fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RoutingError::Format(e.to_string()))
    }

    fn transform(&self, records: &Array2<f64>) -> Result<Array2<f64>> {
        let words = records.slice(s![.., ..self.word_features]);
        let Some(pca) = &self.pca else {
            return Ok(words.to_owned());
        };
        let layout = records.slice(s![.., self.word_features..]).to_owned();
        let projected: Array2<f64> = pca.predict(&layout);
        concatenate(Axis(1), &[projected.view(), words])
            .map_err(|e| RoutingError::Inference(format!("cannot assemble features: {e}")))
    }
}

impl Classifier for LayoutForest {
    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        if features.len() != self.num_features() {
            return Err(RoutingError::Inference(format!(
                "got {} features, model expects {}",
                features.len(),
                self.num_features()
            )));
        }

        let record = to_matrix(&[features.to_vec()], features.len())?;
        let transformed = self.transform(&record)?;

        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            let predicted: Array1<usize> = tree.predict(&transformed);
            if let Some(slot) = predicted.first().and_then(|&class| votes.get_mut(class)) {
                *slot += 1;
            }
        }

        let (best, count) = votes
            .iter()
            .enumerate()
            .fold((0, 0), |best, (index, &count)| if count > best.1 { (index, count) } else { best });
        let label = self
            .classes
            .get(best)
            .cloned()
            .ok_or_else(|| RoutingError::Inference("forest model has no classes".to_string()))?;

        Ok(Prediction {
            label,
            probability: count as f64 / self.trees.len() as f64,
        })
    }
}

impl ExportClassifier for LayoutForest {
    fn export(&self, num_features: usize) -> Result<ClassifierBackend> {
        if num_features != self.num_features() {
            return Err(RoutingError::InvalidInput(format!(
                "forest was fitted on {} features, encoder produces {num_features}",
                self.num_features()
            )));
        }
        Ok(ClassifierBackend::new(BackendKind::Forest, self.to_blob()?))
    }
}

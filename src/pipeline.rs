use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::core::model::{LayoutShape, Prediction, Word};
use crate::core::vocabulary::{
    build_balanced_vocabulary, build_global_vocabulary, Vocabulary, VocabularyPolicy,
};
use crate::encode::FeatureEncoder;
use crate::evaluation::{stratified_split, ConfusionMatrix, TrainingReport};
use crate::export::{with_suffix, Exporter, JsonExporter, TextExporter};
use crate::ocr::ProviderKind;
use crate::routing::{Classifier, LayoutForest, RoutingModel};

pub const DEFAULT_NUMBER_OF_WORDS: usize = 50;
pub const DEFAULT_SHAPE: usize = 50;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_dir: PathBuf,
    /// Output prefix; the model is written to `<model_name>.json`.
    pub model_name: PathBuf,
    pub number_of_words: usize,
    pub shape: LayoutShape,
    pub policy: VocabularyPolicy,
    pub provider: ProviderKind,
}

impl TrainConfig {
    pub fn new(data_dir: PathBuf, model_name: PathBuf) -> Result<Self> {
        Ok(Self {
            data_dir,
            model_name,
            number_of_words: DEFAULT_NUMBER_OF_WORDS,
            shape: LayoutShape::new(DEFAULT_SHAPE, DEFAULT_SHAPE)?,
            policy: VocabularyPolicy::default(),
            provider: ProviderKind::default(),
        })
    }

    pub fn model_path(&self) -> PathBuf {
        with_suffix(&self.model_name, ".json")
    }
}

/// One labelled image of the training corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub layout: String,
    pub image: PathBuf,
}

#[derive(Debug)]
pub struct TrainedModel {
    pub model: RoutingModel,
    pub report: TrainingReport,
}

/// True when the file starts with the signature of a known image format.
pub fn is_image(path: &Path) -> Result<bool> {
    let mut header = Vec::with_capacity(32);
    File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .take(32)
        .read_to_end(&mut header)?;
    Ok(image::guess_format(&header).is_ok())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Collects `<data_dir>/<layout>/<image>` samples in a stable order.
pub fn discover_corpus(data_dir: &Path) -> Result<Vec<Sample>> {
    let mut samples = Vec::new();
    for layout_dir in sorted_entries(data_dir)? {
        if !layout_dir.is_dir() {
            continue;
        }
        let Some(layout) = layout_dir.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };
        for path in sorted_entries(&layout_dir)? {
            if path.is_file() && is_image(&path)? {
                samples.push(Sample {
                    layout: layout.clone(),
                    image: path,
                });
            }
        }
    }
    tracing::info!(data_dir = %data_dir.display(), samples = samples.len(), "discovered corpus");
    Ok(samples)
}

pub fn build_vocabulary(
    pages: &[Vec<Word>],
    labels: &[String],
    size: usize,
    policy: VocabularyPolicy,
) -> Result<Vocabulary> {
    let vocabulary = match policy {
        VocabularyPolicy::LayoutAware => build_balanced_vocabulary(pages, size, labels)?,
        VocabularyPolicy::LayoutAgnostic => build_global_vocabulary(pages, size),
    };
    Ok(vocabulary)
}

fn fit_classifier(
    pages: &[Vec<Word>],
    labels: &[String],
    config: &TrainConfig,
) -> Result<(FeatureEncoder, LayoutForest)> {
    let vocabulary = build_vocabulary(pages, labels, config.number_of_words, config.policy)?;
    let encoder = FeatureEncoder::new(vocabulary, config.shape);
    let features = pages
        .iter()
        .map(|words| encoder.encode(words))
        .collect::<crate::error::Result<Vec<_>>>()?;
    let classifier = LayoutForest::fit(&features, labels, encoder.vocabulary().len())?;
    Ok((encoder, classifier))
}

fn select<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}

fn evaluate_holdout(
    pages: &[Vec<Word>],
    labels: &[String],
    layouts: &[String],
    config: &TrainConfig,
) -> Result<(usize, usize, ConfusionMatrix)> {
    let mut confusion = ConfusionMatrix::new(layouts);
    let (train, test) = stratified_split(labels);
    if test.is_empty() {
        tracing::warn!("not enough samples for a hold-out evaluation");
        return Ok((train.len(), 0, confusion));
    }

    let (encoder, classifier) =
        fit_classifier(&select(pages, &train), &select(labels, &train), config)?;
    for &index in &test {
        let features = encoder.encode(&pages[index])?;
        let prediction = classifier.predict(&features)?;
        confusion.record(&labels[index], &prediction.label)?;
    }
    tracing::info!(
        train = train.len(),
        test = test.len(),
        accuracy = confusion.accuracy(),
        "evaluated hold-out split"
    );
    Ok((train.len(), test.len(), confusion))
}

/// Trains a routing model on the corpus and evaluates it on a hold-out split.
pub fn train(config: &TrainConfig) -> Result<TrainedModel> {
    let samples = discover_corpus(&config.data_dir)?;

    let mut pages = Vec::with_capacity(samples.len());
    let mut labels = Vec::with_capacity(samples.len());
    let mut skipped = Vec::new();
    for sample in &samples {
        let words = config
            .provider
            .ocr_results(&sample.image)
            .with_context(|| format!("failed to load OCR words for {}", sample.image.display()))?;
        if words.is_empty() {
            tracing::warn!(image = %sample.image.display(), "skipping sample without words");
            skipped.push(sample.image.display().to_string());
            continue;
        }
        pages.push(words);
        labels.push(sample.layout.clone());
    }
    if pages.is_empty() {
        anyhow::bail!("no usable samples under {}", config.data_dir.display());
    }

    let mut layouts = labels.clone();
    layouts.sort();
    layouts.dedup();
    let mut samples_per_layout: BTreeMap<String, usize> = BTreeMap::new();
    for label in &labels {
        *samples_per_layout.entry(label.clone()).or_default() += 1;
    }

    let (train_samples, test_samples, confusion) =
        evaluate_holdout(&pages, &labels, &layouts, config)?;

    let (encoder, classifier) = fit_classifier(&pages, &labels, config)?;
    let created = Utc::now().to_rfc3339();
    let tags = BTreeMap::from([("creation_time".to_string(), created.clone())]);
    let vocabulary = encoder.vocabulary().clone();
    let vocabulary_size = vocabulary.len();
    let model = RoutingModel::from_trained(
        &classifier,
        vocabulary,
        config.shape,
        tags,
        layouts.clone(),
    )?;
    tracing::info!(
        layouts = layouts.len(),
        vocabulary = vocabulary_size,
        shape = %config.shape,
        "trained routing model"
    );

    let report = TrainingReport {
        model_name: config.model_name.display().to_string(),
        created,
        layouts,
        samples_per_layout,
        skipped,
        vocabulary_size,
        shape: config.shape,
        train_samples,
        test_samples,
        accuracy: confusion.accuracy(),
        confusion,
    };
    Ok(TrainedModel { model, report })
}

/// Trains, then writes the model and its reports. Returns the model path.
pub fn run_training(config: &TrainConfig) -> Result<(PathBuf, TrainedModel)> {
    let trained = train(config)?;
    let model_path = config.model_path();
    if let Some(parent) = model_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    trained
        .model
        .save(&model_path)
        .with_context(|| format!("failed to write model {}", model_path.display()))?;

    let exporters: [Box<dyn Exporter>; 2] = [
        Box::new(JsonExporter::new(config.model_name.clone())),
        Box::new(TextExporter::new(config.model_name.clone())),
    ];
    for exporter in &exporters {
        let path = exporter.export(&trained.report)?;
        tracing::info!(path = %path.display(), "wrote training report");
    }
    Ok((model_path, trained))
}

/// Runs OCR lookup for `image` and classifies the page.
pub fn classify_image(
    model: &RoutingModel,
    image: &Path,
    provider: ProviderKind,
) -> Result<Prediction> {
    let words = provider
        .ocr_results(image)
        .with_context(|| format!("failed to load OCR words for {}", image.display()))?;
    let prediction = model
        .classify_with_probability(&words)
        .with_context(|| format!("failed to classify {}", image.display()))?;
    tracing::info!(
        image = %image.display(),
        label = %prediction.label,
        probability = prediction.probability,
        "classified image"
    );
    Ok(prediction)
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use docroute::core::model::LayoutShape;
use docroute::core::vocabulary::VocabularyPolicy;
use docroute::ocr::ProviderKind;
use docroute::pipeline::{classify_image, run_training, TrainConfig};
use docroute::routing::{ModelSource, RoutingModel};

#[derive(Parser, Debug)]
#[command(name = "docroute")]
#[command(version, about = "Route scanned documents by vocabulary and page layout", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a routing model from <data_dir>/<layout>/<image> samples
    Train {
        /// Corpus directory, one subdirectory per layout
        data_dir: PathBuf,

        /// Output prefix; writes <model_name>.json and its reports
        model_name: PathBuf,

        /// Vocabulary size
        #[arg(long, default_value_t = 50)]
        number_of_words: usize,

        /// Layout grid rows and columns
        #[arg(long, num_args = 2, value_names = ["ROWS", "COLS"], default_values_t = vec![50, 50])]
        shape: Vec<usize>,

        /// How vocabulary words are selected
        #[arg(long, value_enum, default_value_t = Vocab::Aware)]
        vocabulary: Vocab,

        /// Cached OCR result format
        #[arg(long, value_enum, default_value_t = ProviderKind::Ocr)]
        provider: ProviderKind,
    },

    /// Classify an image with a trained model
    Classify {
        /// Model JSON file
        model: PathBuf,

        /// Image whose OCR result is cached next to it
        image: PathBuf,

        #[arg(long, value_enum, default_value_t = ProviderKind::Ocr)]
        provider: ProviderKind,
    },

    /// Show information about a model file
    Info {
        model: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Vocab {
    /// Most frequent words per layout
    Aware,
    /// Most frequent words over the corpus
    Agnostic,
}

impl From<Vocab> for VocabularyPolicy {
    fn from(value: Vocab) -> Self {
        match value {
            Vocab::Aware => VocabularyPolicy::LayoutAware,
            Vocab::Agnostic => VocabularyPolicy::LayoutAgnostic,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docroute=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data_dir,
            model_name,
            number_of_words,
            shape,
            vocabulary,
            provider,
        } => train(data_dir, model_name, number_of_words, &shape, vocabulary, provider),
        Commands::Classify {
            model,
            image,
            provider,
        } => classify(model, image, provider),
        Commands::Info { model } => show_info(model),
    }
}

fn load_model(path: PathBuf) -> Result<RoutingModel> {
    let display = path.display().to_string();
    RoutingModel::deserialize(&ModelSource::FilePath(path))
        .with_context(|| format!("Failed to load model: {display}"))
}

fn train(
    data_dir: PathBuf,
    model_name: PathBuf,
    number_of_words: usize,
    shape: &[usize],
    vocabulary: Vocab,
    provider: ProviderKind,
) -> Result<()> {
    if !data_dir.is_dir() {
        anyhow::bail!("Data directory does not exist: {}", data_dir.display());
    }
    let &[rows, cols] = shape else {
        anyhow::bail!("--shape takes exactly two values");
    };

    let mut config = TrainConfig::new(data_dir, model_name)?;
    config.number_of_words = number_of_words;
    config.shape = LayoutShape::new(rows, cols)?;
    config.policy = vocabulary.into();
    config.provider = provider;

    let (model_path, trained) = run_training(&config)?;

    println!("Model: {}", model_path.display());
    println!("Layouts: {}", trained.report.layouts.join(", "));
    match trained.report.accuracy {
        Some(accuracy) => println!("Hold-out accuracy: {:.2}%", accuracy * 100.0),
        None => println!("Hold-out accuracy: n/a"),
    }
    Ok(())
}

fn classify(model: PathBuf, image: PathBuf, provider: ProviderKind) -> Result<()> {
    if !image.is_file() {
        anyhow::bail!("Input is not a file: {}", image.display());
    }
    let model = load_model(model)?;
    let prediction = classify_image(&model, &image, provider)?;
    println!("{}\t{:.4}", prediction.label, prediction.probability);
    Ok(())
}

fn show_info(path: PathBuf) -> Result<()> {
    let file = path.display().to_string();
    let model = load_model(path)?;

    println!("Routing model");
    println!("=============");
    println!("File: {file}");
    println!("Layouts: {}", model.layouts().join(", "));
    println!("Vocabulary: {} words", model.vocabulary().len());
    println!("Shape: {}", model.shape());
    if let Some(backend) = model.backend() {
        println!("Backend: {:?} ({} bytes)", backend.kind(), backend.blob().len());
    }
    for (key, value) in model.tags() {
        println!("Tag {key}: {value}");
    }
    Ok(())
}

//! End-to-end run: load, split, train, evaluate.

use std::path::Path;

use burn::{config::Config, tensor::backend::AutodiffBackend};
use tracing::info;

use crate::data::{self, MissingValuePolicy, MissingValueReport, NUM_CLASSES};
use crate::error::Result;
use crate::evaluation::{self, Evaluation};
use crate::model::{ClassifierState, DiabetesClassifierConfig};
use crate::split;
use crate::training::{LossTrace, Trainer, TrainingConfig};

/// Everything a run needs besides the input file.
///
/// Serializes to JSON, so a run can be reproduced from a saved config.
#[derive(Config)]
pub struct PipelineConfig {
    #[config(default = "DiabetesClassifierConfig::new()")]
    pub model: DiabetesClassifierConfig,
    #[config(default = "TrainingConfig::new()")]
    pub training: TrainingConfig,
    /// Fraction of rows held out for evaluation.
    #[config(default = 0.2)]
    pub test_fraction: f64,
    /// Seeds both the train/test shuffle and the weight initialization.
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = "MissingValuePolicy::Reject")]
    pub missing_values: MissingValuePolicy,
    /// Where to write the confusion-matrix heatmap, if anywhere.
    pub heatmap_path: Option<String>,
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub missing_values: MissingValueReport,
    pub class_counts: [usize; NUM_CLASSES],
    pub train_rows: usize,
    pub test_rows: usize,
    pub num_params: usize,
    pub losses: LossTrace,
    pub evaluation: Evaluation,
}

fn section(title: &str) {
    println!();
    println!("-----------------------");
    println!("{title}");
    println!("-----------------------");
}

/// Runs the whole pipeline on the CSV at `data_path`.
///
/// Any error aborts the remaining stages.
pub fn run<B: AutodiffBackend>(
    config: &PipelineConfig,
    data_path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<PipelineReport> {
    config.model.validate()?;

    section("Dataset");
    let dataset = data::load_dataset(data_path)?;
    let missing_values = dataset.missing_values();
    println!("Missing values per column:");
    print!("{missing_values}");

    let dataset = dataset.apply_missing_policy(config.missing_values)?;
    let class_counts = dataset.class_counts()?;
    info!(
        no_diabetic = class_counts[0],
        diabetic = class_counts[1],
        "Class balance"
    );

    let (features, labels) = dataset.to_tensors::<B::InnerBackend>(device)?;
    println!("Features tensor shape: {:?}", features.shape());
    println!("Labels tensor shape: {:?}", labels.shape());

    let split = split::train_test_split(features, labels, config.test_fraction, config.seed)?;
    println!(
        "x_train shape: {:?}, y_train shape: {:?}",
        split.x_train.shape(),
        split.y_train.shape()
    );
    println!(
        "x_test shape: {:?}, y_test shape: {:?}",
        split.x_test.shape(),
        split.y_test.shape()
    );

    section("Model");
    let state = ClassifierState::new(config.model.init_seeded::<B>(config.seed, device));
    let num_params = state.num_params();
    println!("Total parameters: {num_params}");

    section("Training");
    let trainer = Trainer::new(config.training.clone());
    let (state, losses) = trainer.fit(state, split.x_train.clone(), split.y_train.clone())?;
    if let Some(loss) = losses.last() {
        println!("Final train loss: {loss:.4}");
    }

    section("Evaluation");
    let (_, evaluation) = evaluation::evaluate(state, split.x_test.clone(), split.y_test.clone())?;
    print!("{}", evaluation.confusion_matrix);
    println!("Accuracy: {}", evaluation.accuracy);

    if let Some(path) = &config.heatmap_path {
        evaluation.confusion_matrix.write_heatmap(path)?;
        info!(path = %path, "Wrote confusion matrix heatmap");
    }

    Ok(PipelineReport {
        missing_values,
        class_counts,
        train_rows: split.train_len(),
        test_rows: split.test_len(),
        num_params,
        losses,
        evaluation,
    })
}

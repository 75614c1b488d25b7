//! Diabetes risk classification on the Pima Indians Diabetes dataset.
//!
//! A small feed-forward network (8 → 20 → 20 → 2) is trained full-batch with
//! Adam on cross-entropy, then evaluated with a confusion matrix and accuracy.
//!
//! - [`data`] loads and validates the CSV, reports missing values
//! - [`split`] makes a seeded train/test split
//! - [`model`] defines the network and its training/inference state
//! - [`training`] runs the training loop
//! - [`evaluation`] computes predictions, the confusion matrix and accuracy
//! - [`pipeline`] chains all of the above

pub mod data;
pub mod error;
pub mod evaluation;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod split;
pub mod training;

pub use data::{Dataset, MissingValuePolicy, MissingValueReport, label_name, load_dataset};
pub use error::{PipelineError, Result};
pub use evaluation::{ConfusionMatrix, Evaluation};
pub use model::{ClassifierState, DiabetesClassifier, DiabetesClassifierConfig, Mode};
pub use pipeline::{PipelineConfig, PipelineReport};
pub use split::Split;
pub use training::{LossTrace, Trainer, TrainingConfig};

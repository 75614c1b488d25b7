//! Training utilities for the diabetes classifier
//!
//! This module provides the full-batch training loop:
//! - Adam optimizer with a fixed learning rate
//! - CrossEntropyLoss averaged over the whole training set
//! - Loss tracking and periodic progress reports
//! - Detection of non-finite losses

use burn::{
    config::Config,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{ElementConversion, Float, Int, Tensor, backend::AutodiffBackend},
};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::model::{ClassifierState, DiabetesClassifier};

/// Hyperparameters of the training loop.
#[derive(Config)]
pub struct TrainingConfig {
    #[config(default = 500)]
    pub epochs: usize,
    #[config(default = 1.0e-2)]
    pub learning_rate: f64,
    /// Print progress every N epochs, starting at epoch 1. Zero disables it.
    #[config(default = 10)]
    pub report_interval: usize,
    #[config(default = "AdamConfig::new()")]
    pub optimizer: AdamConfig,
}

/// Training loss recorded once per epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossTrace {
    values: Vec<f64>,
}

impl LossTrace {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    fn push(&mut self, loss: f64) {
        self.values.push(loss);
    }
}

/// Whether the 1-based `epoch` gets a progress line.
pub fn should_report(epoch: usize, report_interval: usize) -> bool {
    report_interval > 0 && epoch >= 1 && (epoch - 1) % report_interval == 0
}

/// Runs the training loop described by a [`TrainingConfig`].
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Trains the classifier
    ///
    /// Every epoch runs a forward pass over the entire training set, computes
    /// the mean cross-entropy, records it, backpropagates and applies one Adam
    /// step. The loop always runs exactly `epochs` iterations.
    ///
    /// The input tensors live on the inner backend and are lifted onto the
    /// autodiff backend for training.
    ///
    /// # Arguments
    /// * `state` - The classifier, which must still be in training mode
    /// * `x_train` - Training features of shape [n_samples, 8]
    /// * `y_train` - Training labels of shape [n_samples]
    ///
    /// # Returns
    /// * `Ok((state, losses))` - Trained classifier (still in training mode)
    ///   and one loss value per epoch
    /// * `Err(PipelineError::Frozen)` - If the classifier was already frozen
    /// * `Err(PipelineError::NumericalInstability)` - If a loss is NaN or infinite
    pub fn fit<B: AutodiffBackend>(
        &self,
        state: ClassifierState<B>,
        x_train: Tensor<B::InnerBackend, 2, Float>,
        y_train: Tensor<B::InnerBackend, 1, Int>,
    ) -> Result<(ClassifierState<B>, LossTrace)> {
        let mut model = state.into_training()?;

        if x_train.dims()[0] != y_train.dims()[0] {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} training rows but {} labels",
                x_train.dims()[0],
                y_train.dims()[0]
            )));
        }

        let x_train = Tensor::<B, 2, Float>::from_inner(x_train);
        let y_train = Tensor::<B, 1, Int>::from_inner(y_train);

        let device = x_train.device();
        let criterion = CrossEntropyLossConfig::new().init(&device);
        let mut optimizer = self.config.optimizer.init::<B, DiabetesClassifier<B>>();

        info!(
            epochs = self.config.epochs,
            learning_rate = self.config.learning_rate,
            rows = x_train.dims()[0],
            "Starting training"
        );

        let mut losses = LossTrace::default();
        for epoch in 1..=self.config.epochs {
            let output = model.forward(x_train.clone());
            let loss = criterion.forward(output, y_train.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(PipelineError::NumericalInstability(format!(
                    "loss is {loss_value} at epoch {epoch}"
                )));
            }
            losses.push(loss_value);

            if should_report(epoch, self.config.report_interval) {
                println!("Epoch number: {epoch} and the loss: {loss_value}");
            }

            // backward() builds fresh gradients, nothing accumulates across epochs
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(self.config.learning_rate, model, grads);
        }

        if let (Some(first), Some(last)) = (losses.first(), losses.last()) {
            debug!(first, last, "Loss trend");
        }
        info!(epochs = losses.len(), final_loss = ?losses.last(), "Training finished");

        Ok((ClassifierState::Training(model), losses))
    }
}

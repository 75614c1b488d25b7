//! Neural network model for diabetes classification
//!
//! This module provides a small feed-forward classifier for the Pima Indians
//! Diabetes dataset with 2 output classes, and the training/inference state
//! the pipeline moves it through.

use burn::{
    config::Config,
    module::{AutodiffModule, Module, Param},
    nn::{Linear, LinearConfig, Relu},
    tensor::{
        Float, Tensor,
        backend::{AutodiffBackend, Backend},
    },
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::data::{NUM_CLASSES, NUM_FEATURES};
use crate::error::{PipelineError, Result};

/// Layer sizes of [`DiabetesClassifier`].
#[derive(Config, Debug)]
pub struct DiabetesClassifierConfig {
    #[config(default = 8)]
    pub input_size: usize,
    #[config(default = 20)]
    pub hidden_size_1: usize,
    #[config(default = 20)]
    pub hidden_size_2: usize,
    #[config(default = 2)]
    pub num_classes: usize,
}

impl DiabetesClassifierConfig {
    /// Initializes a model with random weights drawn from the backend RNG.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DiabetesClassifier<B> {
        DiabetesClassifier::new(self, device)
    }

    /// Initializes a model whose weights are drawn from a generator seeded by `seed`.
    ///
    /// The backend RNG is not involved, so the same seed always yields the
    /// same initial parameters.
    pub fn init_seeded<B: Backend>(&self, seed: u64, device: &B::Device) -> DiabetesClassifier<B> {
        DiabetesClassifier::new_seeded(self, seed, device)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.input_size != NUM_FEATURES || self.num_classes != NUM_CLASSES {
            return Err(PipelineError::InvalidConfig(format!(
                "model must map {NUM_FEATURES} features to {NUM_CLASSES} classes, got {} -> {}",
                self.input_size, self.num_classes
            )));
        }
        if self.hidden_size_1 == 0 || self.hidden_size_2 == 0 {
            return Err(PipelineError::InvalidConfig(
                "hidden layers need at least one unit".to_string(),
            ));
        }
        Ok(())
    }
}

/// Neural network model for diabetes classification
///
/// Architecture: 8 → 20 (ReLU) → 20 (ReLU) → 2 with the default config.
///
/// The output layer is a bare affine transform producing logits; turning them
/// into probabilities is left to the loss function.
#[derive(Module, Debug)]
pub struct DiabetesClassifier<B: Backend> {
    linear1: Linear<B>,
    linear2: Linear<B>,
    linear3: Linear<B>,
    activation: Relu,
}

impl<B: Backend> DiabetesClassifier<B> {
    /// Creates a new diabetes classifier
    ///
    /// Initializes all layers with the default Burn initializer, drawing from
    /// the backend RNG when the parameters are first used.
    ///
    /// # Arguments
    /// * `config` - Layer sizes
    /// * `device` - The device to initialize the model on
    ///
    /// # Returns
    /// * `Self` - A new instance with randomly initialized weights
    pub fn new(config: &DiabetesClassifierConfig, device: &B::Device) -> Self {
        let linear1: Linear<B> =
            LinearConfig::new(config.input_size, config.hidden_size_1).init(device);
        let linear2: Linear<B> =
            LinearConfig::new(config.hidden_size_1, config.hidden_size_2).init(device);
        let linear3: Linear<B> =
            LinearConfig::new(config.hidden_size_2, config.num_classes).init(device);
        let activation = Relu::new();

        Self {
            linear1,
            linear2,
            linear3,
            activation,
        }
    }

    /// Creates a classifier with reproducible weights
    ///
    /// Weights and biases are drawn eagerly from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`,
    /// the same range as Burn's default `Linear` initializer.
    ///
    /// # Arguments
    /// * `config` - Layer sizes
    /// * `seed` - Seed of the weight generator
    /// * `device` - The device to initialize the model on
    ///
    /// # Returns
    /// * `Self` - A new instance, identical for identical seeds
    pub fn new_seeded(config: &DiabetesClassifierConfig, seed: u64, device: &B::Device) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        Self {
            linear1: seeded_linear(&mut rng, config.input_size, config.hidden_size_1, device),
            linear2: seeded_linear(&mut rng, config.hidden_size_1, config.hidden_size_2, device),
            linear3: seeded_linear(&mut rng, config.hidden_size_2, config.num_classes, device),
            activation: Relu::new(),
        }
    }

    /// Performs a forward pass through the network
    ///
    /// input → linear1 → relu → linear2 → relu → linear3 → logits
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch_size, 8]
    ///
    /// # Returns
    /// * `Tensor<B, 2, Float>` - Output logits of shape [batch_size, 2]
    pub fn forward(&self, input: Tensor<B, 2, Float>) -> Tensor<B, 2, Float> {
        let x = self.linear1.forward(input);
        let x = self.activation.forward(x);
        let x = self.linear2.forward(x);
        let x = self.activation.forward(x);
        self.linear3.forward(x)
    }
}

fn seeded_linear<B: Backend>(
    rng: &mut StdRng,
    d_input: usize,
    d_output: usize,
    device: &B::Device,
) -> Linear<B> {
    let bound = 1.0 / (d_input as f32).sqrt();
    let mut sample = |n: usize| -> Vec<f32> { (0..n).map(|_| rng.gen_range(-bound..bound)).collect() };

    // Burn stores Linear weights as [d_input, d_output]
    let weight = Tensor::<B, 1, Float>::from_floats(sample(d_input * d_output).as_slice(), device)
        .reshape([d_input, d_output]);
    let bias = Tensor::<B, 1, Float>::from_floats(sample(d_output).as_slice(), device);

    Linear {
        weight: Param::from_tensor(weight),
        bias: Some(Param::from_tensor(bias)),
    }
}

#[cfg(test)]
impl<B: Backend> DiabetesClassifier<B> {
    /// Replaces the output bias with NaN so every logit is non-finite.
    pub(crate) fn with_nan_output_bias(mut self) -> Self {
        let weight = self.linear3.weight.val();
        let bias = Tensor::<B, 1, Float>::full([weight.dims()[1]], f32::NAN, &weight.device());
        self.linear3.bias = Some(Param::from_tensor(bias));
        self
    }
}

/// Whether the classifier can still be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Inference,
}

/// The classifier together with its mode.
///
/// `Training` holds the model on the autodiff backend. `Inference` holds it on
/// the inner backend, where no gradient can be tracked. The only transition is
/// [`ClassifierState::freeze`], from training to inference.
#[derive(Debug)]
pub enum ClassifierState<B: AutodiffBackend> {
    Training(DiabetesClassifier<B>),
    Inference(DiabetesClassifier<B::InnerBackend>),
}

impl<B: AutodiffBackend> ClassifierState<B> {
    pub fn new(model: DiabetesClassifier<B>) -> Self {
        ClassifierState::Training(model)
    }

    pub fn mode(&self) -> Mode {
        match self {
            ClassifierState::Training(_) => Mode::Training,
            ClassifierState::Inference(_) => Mode::Inference,
        }
    }

    pub fn num_params(&self) -> usize {
        match self {
            ClassifierState::Training(model) => model.num_params(),
            ClassifierState::Inference(model) => model.num_params(),
        }
    }

    /// Switches to inference. Freezing an already frozen classifier is a no-op.
    pub fn freeze(self) -> Self {
        match self {
            ClassifierState::Training(model) => ClassifierState::Inference(model.valid()),
            frozen => frozen,
        }
    }

    /// Takes the trainable model out, failing once the classifier is frozen.
    pub fn into_training(self) -> Result<DiabetesClassifier<B>> {
        match self {
            ClassifierState::Training(model) => Ok(model),
            ClassifierState::Inference(_) => Err(PipelineError::Frozen),
        }
    }

    /// Freezes the classifier and hands out the inference model.
    pub fn into_inference(self) -> DiabetesClassifier<B::InnerBackend> {
        match self.freeze() {
            ClassifierState::Inference(model) => model,
            ClassifierState::Training(model) => model.valid(),
        }
    }

    /// The frozen model, if the classifier has been switched to inference.
    pub fn inference_model(&self) -> Option<&DiabetesClassifier<B::InnerBackend>> {
        match self {
            ClassifierState::Training(_) => None,
            ClassifierState::Inference(model) => Some(model),
        }
    }
}

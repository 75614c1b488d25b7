//! Seeded train/test splitting.

use burn::tensor::{Float, Int, Tensor, backend::Backend};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Training and test partitions of the feature and label tensors.
#[derive(Debug, Clone)]
pub struct Split<B: Backend> {
    pub x_train: Tensor<B, 2, Float>,
    pub x_test: Tensor<B, 2, Float>,
    pub y_train: Tensor<B, 1, Int>,
    pub y_test: Tensor<B, 1, Int>,
}

impl<B: Backend> Split<B> {
    pub fn train_len(&self) -> usize {
        self.x_train.dims()[0]
    }

    pub fn test_len(&self) -> usize {
        self.x_test.dims()[0]
    }
}

/// Number of rows held out for testing: `round(num_rows * test_fraction)`.
pub fn test_size(num_rows: usize, test_fraction: f64) -> usize {
    (num_rows as f64 * test_fraction).round() as usize
}

/// Randomly partitions row indices into `(train, test)` index sets
///
/// The rows are shuffled with a generator seeded by `seed`; the first
/// `round(num_rows * test_fraction)` shuffled indices form the test set.
/// Simple random sampling, not stratified by class.
///
/// # Returns
/// * `Err(PipelineError::InvalidConfig)` - If `test_fraction` is outside
///   `(0, 1)` or either partition would be empty
pub fn partition_indices(
    num_rows: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let n_test = test_size(num_rows, test_fraction);
    if n_test == 0 || n_test == num_rows {
        return Err(PipelineError::InvalidConfig(format!(
            "splitting {num_rows} rows with test fraction {test_fraction} leaves an empty partition"
        )));
    }

    let mut indices: Vec<usize> = (0..num_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Splits tensors into training and test sets
///
/// # Arguments
/// * `x` - 2D feature tensor of shape [num_samples, num_features]
/// * `y` - 1D label tensor of shape [num_samples]
/// * `test_fraction` - Proportion of rows held out for testing (e.g. 0.2)
/// * `seed` - Seed controlling the shuffle
///
/// # Returns
/// * `Ok(Split)` - Disjoint partitions covering every row
/// * `Err(PipelineError::ShapeMismatch)` - If `x` and `y` disagree on the row count
pub fn train_test_split<B: Backend>(
    x: Tensor<B, 2, Float>,
    y: Tensor<B, 1, Int>,
    test_fraction: f64,
    seed: u64,
) -> Result<Split<B>> {
    let num_rows = x.dims()[0];
    if y.dims()[0] != num_rows {
        return Err(PipelineError::ShapeMismatch(format!(
            "{num_rows} feature rows but {} labels",
            y.dims()[0]
        )));
    }

    let (train, test) = partition_indices(num_rows, test_fraction, seed)?;
    debug!(train = train.len(), test = test.len(), seed, "Partitioned rows");

    let device = x.device();
    let to_index_tensor = |indices: &[usize]| {
        let indices: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
        Tensor::<B, 1, Int>::from_ints(indices.as_slice(), &device)
    };
    let train = to_index_tensor(&train);
    let test = to_index_tensor(&test);

    Ok(Split {
        x_train: x.clone().select(0, train.clone()),
        x_test: x.select(0, test.clone()),
        y_train: y.clone().select(0, train),
        y_test: y.select(0, test),
    })
}

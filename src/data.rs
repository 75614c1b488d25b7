//! Data loading utilities for the diabetes classifier
//!
//! This module reads the Pima Indians Diabetes CSV, validates its layout,
//! reports missing values and converts the records into Burn tensors.

use std::fmt;
use std::fs;
use std::path::Path;

use burn::tensor::{Float, Int, Tensor, backend::Backend};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

/// Number of clinical feature columns.
pub const NUM_FEATURES: usize = 8;
/// Number of outcome classes.
pub const NUM_CLASSES: usize = 2;
/// Name of the label column.
pub const OUTCOME_COLUMN: &str = "Outcome";
/// Display names of the classes, indexed by label.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = ["No Diabetic", "Diabetic"];

/// Returns the human-readable name of a class index.
pub fn label_name(class: usize) -> &'static str {
    CLASS_NAMES.get(class).copied().unwrap_or("Unknown")
}

/// What to do with rows that hold missing feature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingValuePolicy {
    /// Fail the run if any value is missing.
    #[default]
    Reject,
    /// Remove every row with at least one missing value.
    DropRows,
}

/// Per-column count of missing values, in file column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValueReport {
    counts: Vec<(String, usize)>,
}

impl MissingValueReport {
    pub fn counts(&self) -> &[(String, usize)] {
        &self.counts
    }

    /// Missing count for a single column, `None` if the column is unknown.
    pub fn count(&self, column: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, count)| *count)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

impl fmt::Display for MissingValueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);
        for (name, count) in &self.counts {
            writeln!(f, "{name:<width$}  {count}")?;
        }
        Ok(())
    }
}

/// The loaded dataset: eight numeric feature columns plus `Outcome`.
///
/// Feature columns are stored as `f32` (missing cells stay null), the outcome
/// column as `i64` holding only 0 or 1. Immutable once built.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    feature_names: Vec<String>,
}

/// Loads the diabetes dataset from a CSV file with a header row
///
/// # Arguments
/// * `path` - Path to the CSV file
///
/// # Returns
/// * `Ok(Dataset)` - Validated dataset, missing values left in place
/// * `Err(PipelineError::DataFormat)` - If the file is missing or unreadable,
///   has the wrong column count, holds non-numeric or non-finite features
///   or an outcome outside {0, 1}
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| {
        PipelineError::DataFormat(format!("cannot open {}: {e}", path.display()))
    })?;

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(file)
        .finish()?;

    info!(
        path = %path.display(),
        rows = frame.height(),
        columns = frame.width(),
        "Loaded dataset"
    );

    Dataset::from_frame(frame)
}

impl Dataset {
    /// Validates a raw frame and normalizes its column types.
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        if frame.width() != NUM_FEATURES + 1 {
            return Err(PipelineError::DataFormat(format!(
                "expected {} columns ({NUM_FEATURES} features and `{OUTCOME_COLUMN}`), found {}",
                NUM_FEATURES + 1,
                frame.width()
            )));
        }
        if frame.height() == 0 {
            return Err(PipelineError::DataFormat("dataset has no rows".to_string()));
        }

        let mut columns = Vec::with_capacity(frame.width());
        let mut feature_names = Vec::with_capacity(NUM_FEATURES);
        let mut has_outcome = false;

        for column in frame.get_columns() {
            let name = column.name().to_string();
            let series = column.as_materialized_series();

            if name == OUTCOME_COLUMN {
                validate_outcome(series)?;
                columns.push(series.cast(&DataType::Int64)?.into_column());
                has_outcome = true;
            } else {
                // Strict casting turns unparsable text into an error instead of a null
                let numeric = series.strict_cast(&DataType::Float32).map_err(|_| {
                    PipelineError::DataFormat(format!(
                        "feature column `{name}` holds non-numeric values"
                    ))
                })?;
                // NaN and inf parse as numbers, not nulls
                let non_finite = numeric
                    .f32()?
                    .into_iter()
                    .flatten()
                    .filter(|v| !v.is_finite())
                    .count();
                if non_finite > 0 {
                    return Err(PipelineError::DataFormat(format!(
                        "feature column `{name}` holds {non_finite} non-finite values"
                    )));
                }
                columns.push(numeric.into_column());
                feature_names.push(name);
            }
        }

        if !has_outcome {
            return Err(PipelineError::DataFormat(format!(
                "missing `{OUTCOME_COLUMN}` column"
            )));
        }

        Ok(Self {
            frame: DataFrame::new(columns)?,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Counts missing values in every column, outcome included.
    pub fn missing_values(&self) -> MissingValueReport {
        MissingValueReport {
            counts: self
                .frame
                .get_columns()
                .iter()
                .map(|column| (column.name().to_string(), column.null_count()))
                .collect(),
        }
    }

    /// Resolves missing values according to `policy`.
    ///
    /// A dataset without missing values is returned unchanged whatever the policy.
    pub fn apply_missing_policy(self, policy: MissingValuePolicy) -> Result<Self> {
        let missing = self.missing_values().total();
        if missing == 0 {
            return Ok(self);
        }

        match policy {
            MissingValuePolicy::Reject => Err(PipelineError::DataFormat(format!(
                "{missing} missing values in the dataset"
            ))),
            MissingValuePolicy::DropRows => {
                let before = self.frame.height();
                let mut keep = BooleanChunked::full("keep".into(), true, before);
                for column in self.frame.get_columns() {
                    keep = &keep & &column.as_materialized_series().is_not_null();
                }
                let frame = self.frame.filter(&keep)?;

                warn!(
                    dropped = before - frame.height(),
                    remaining = frame.height(),
                    "Dropped rows with missing values"
                );
                if frame.height() == 0 {
                    return Err(PipelineError::DataFormat(
                        "no rows left after dropping missing values".to_string(),
                    ));
                }

                Ok(Self {
                    frame,
                    feature_names: self.feature_names,
                })
            }
        }
    }

    /// Outcome labels in row order.
    pub fn labels(&self) -> Result<Vec<i64>> {
        let labels = self
            .frame
            .column(OUTCOME_COLUMN)?
            .as_materialized_series()
            .i64()?
            .into_iter()
            .map(|v| v.unwrap_or_default())
            .collect();
        Ok(labels)
    }

    /// Number of rows per class, indexed by label.
    pub fn class_counts(&self) -> Result<[usize; NUM_CLASSES]> {
        let mut counts = [0; NUM_CLASSES];
        for label in self.labels()? {
            counts[label as usize] += 1;
        }
        Ok(counts)
    }

    /// Converts the dataset into a feature tensor and a label tensor
    ///
    /// # Returns
    /// * `Ok((features, labels))` - Row-major features of shape
    ///   `[num_rows, 8]` and labels of shape `[num_rows]`
    /// * `Err(PipelineError::DataFormat)` - If missing values remain
    pub fn to_tensors<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(Tensor<B, 2, Float>, Tensor<B, 1, Int>)> {
        let missing = self.missing_values().total();
        if missing > 0 {
            return Err(PipelineError::DataFormat(format!(
                "{missing} missing values must be resolved before building tensors"
            )));
        }

        let num_rows = self.len();
        let mut flat = vec![0.0f32; num_rows * NUM_FEATURES];
        for (col, name) in self.feature_names.iter().enumerate() {
            let values = self.frame.column(name)?.as_materialized_series().f32()?;
            for (row, value) in values.into_iter().enumerate() {
                flat[row * NUM_FEATURES + col] = value.unwrap_or_default();
            }
        }

        let features = Tensor::<B, 1, Float>::from_floats(flat.as_slice(), device)
            .reshape([num_rows, NUM_FEATURES]);
        let labels = Tensor::<B, 1, Int>::from_ints(self.labels()?.as_slice(), device);

        Ok((features, labels))
    }
}

fn validate_outcome(series: &Series) -> Result<()> {
    if !series.dtype().is_integer() {
        return Err(PipelineError::DataFormat(format!(
            "`{OUTCOME_COLUMN}` must hold integer labels, found {}",
            series.dtype()
        )));
    }
    if series.null_count() > 0 {
        return Err(PipelineError::DataFormat(format!(
            "`{OUTCOME_COLUMN}` has {} missing labels",
            series.null_count()
        )));
    }

    let labels = series.cast(&DataType::Int64)?;
    if let Some(bad) = labels
        .i64()?
        .into_iter()
        .flatten()
        .find(|label| !(0..NUM_CLASSES as i64).contains(label))
    {
        return Err(PipelineError::DataFormat(format!(
            "`{OUTCOME_COLUMN}` value {bad} is outside {{0, 1}}"
        )));
    }
    Ok(())
}

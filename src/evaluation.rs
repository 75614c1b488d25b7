//! Evaluation of a trained classifier: predictions, confusion matrix,
//! accuracy and a heatmap rendering of the matrix.

use std::fmt;
use std::fs;
use std::path::Path;

use burn::tensor::{Float, Int, Tensor, backend::AutodiffBackend, backend::Backend};
use tracing::info;

use crate::data::{CLASS_NAMES, NUM_CLASSES, label_name};
use crate::error::{PipelineError, Result};
use crate::model::{ClassifierState, DiabetesClassifier};

/// Predicts a class index for every row of `x`, preserving row order
///
/// # Arguments
/// * `model` - Model used for the forward pass
/// * `x` - Features of shape [n_samples, 8]
///
/// # Returns
/// * `Ok(Vec<usize>)` - Index of the largest logit per row
/// * `Err(PipelineError::NumericalInstability)` - If any logit is NaN or infinite
pub fn predict<B: Backend>(
    model: &DiabetesClassifier<B>,
    x: Tensor<B, 2, Float>,
) -> Result<Vec<usize>> {
    let num_rows = x.dims()[0];
    let logits = model.forward(x);

    if logits.to_data().iter::<f32>().any(|v| !v.is_finite()) {
        return Err(PipelineError::NumericalInstability(
            "model produced non-finite logits".to_string(),
        ));
    }

    let predictions: Tensor<B, 1, Int> = logits.argmax(1).reshape([num_rows]);
    Ok(predictions
        .into_data()
        .iter::<i64>()
        .map(|class| class as usize)
        .collect())
}

/// 2×2 table of counts indexed by (actual class, predicted class).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    counts: [[usize; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    pub fn from_predictions(actual: &[usize], predicted: &[usize]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} actual labels but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }

        let mut counts = [[0; NUM_CLASSES]; NUM_CLASSES];
        for (&a, &p) in actual.iter().zip(predicted) {
            if a >= NUM_CLASSES || p >= NUM_CLASSES {
                return Err(PipelineError::ShapeMismatch(format!(
                    "class pair ({a}, {p}) outside the {NUM_CLASSES} known classes"
                )));
            }
            counts[a][p] += 1;
        }
        Ok(Self { counts })
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual][predicted]
    }

    pub fn as_array(&self) -> [[usize; NUM_CLASSES]; NUM_CLASSES] {
        self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..NUM_CLASSES).map(|c| self.counts[c][c]).sum()
    }

    /// Fraction of rows on the diagonal; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    /// Precision of the positive ("Diabetic") class.
    pub fn precision(&self) -> f64 {
        ratio(self.counts[1][1], self.counts[0][1] + self.counts[1][1])
    }

    /// Recall of the positive ("Diabetic") class.
    pub fn recall(&self) -> f64 {
        ratio(self.counts[1][1], self.counts[1][0] + self.counts[1][1])
    }

    /// Renders the matrix as an SVG heatmap annotated with the counts.
    pub fn to_svg(&self) -> String {
        const CELL: usize = 120;
        const LEFT: usize = 150;
        const TOP: usize = 70;

        let width = LEFT + NUM_CLASSES * CELL + 20;
        let height = TOP + NUM_CLASSES * CELL + 20;
        let max = self.counts.iter().flatten().copied().max().unwrap_or(0).max(1);

        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" font-family=\"sans-serif\" font-size=\"14\">\n"
        );
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"20\" text-anchor=\"middle\" font-weight=\"bold\">Predicted</text>\n",
            LEFT + NUM_CLASSES * CELL / 2
        ));
        svg.push_str(&format!(
            "  <text x=\"20\" y=\"{y}\" text-anchor=\"middle\" font-weight=\"bold\" transform=\"rotate(-90 20 {y})\">Actual</text>\n",
            y = TOP + NUM_CLASSES * CELL / 2
        ));

        for class in 0..NUM_CLASSES {
            svg.push_str(&format!(
                "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\">{}</text>\n",
                LEFT + class * CELL + CELL / 2,
                TOP - 12,
                label_name(class)
            ));
            svg.push_str(&format!(
                "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\">{}</text>\n",
                LEFT - 8,
                TOP + class * CELL + CELL / 2 + 5,
                label_name(class)
            ));
        }

        for (actual, row) in self.counts.iter().enumerate() {
            for (predicted, &count) in row.iter().enumerate() {
                let intensity = count as f64 / max as f64;
                let shade = (245.0 - intensity * 190.0).round() as u8;
                let ink = if intensity > 0.5 { "white" } else { "black" };
                let x = LEFT + predicted * CELL;
                let y = TOP + actual * CELL;
                svg.push_str(&format!(
                    "  <rect x=\"{x}\" y=\"{y}\" width=\"{CELL}\" height=\"{CELL}\" fill=\"rgb({shade},{shade},255)\" stroke=\"white\"/>\n"
                ));
                svg.push_str(&format!(
                    "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"20\" fill=\"{ink}\">{count}</text>\n",
                    x + CELL / 2,
                    y + CELL / 2 + 7
                ));
            }
        }

        svg.push_str("</svg>\n");
        svg
    }

    pub fn write_heatmap(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_svg())?;
        Ok(())
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = CLASS_NAMES.iter().map(|name| name.len()).max().unwrap_or(0);
        write!(f, "{:<width$}", "actual \\ predicted")?;
        for name in CLASS_NAMES {
            write!(f, "  {name:>width$}")?;
        }
        writeln!(f)?;
        for (actual, row) in self.counts.iter().enumerate() {
            write!(f, "{:<w$}", label_name(actual), w = width.max(18))?;
            for count in row {
                write!(f, "  {count:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Result of evaluating the classifier on the test split.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub predictions: Vec<usize>,
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
}

/// Evaluates a model on labelled data without touching its parameters.
pub fn evaluate_model<B: Backend>(
    model: &DiabetesClassifier<B>,
    x_test: Tensor<B, 2, Float>,
    y_test: Tensor<B, 1, Int>,
) -> Result<Evaluation> {
    if x_test.dims()[0] != y_test.dims()[0] {
        return Err(PipelineError::ShapeMismatch(format!(
            "{} test rows but {} labels",
            x_test.dims()[0],
            y_test.dims()[0]
        )));
    }

    let predictions = predict(model, x_test)?;
    let actual: Vec<usize> = y_test
        .into_data()
        .iter::<i64>()
        .map(|label| label as usize)
        .collect();

    let confusion_matrix = ConfusionMatrix::from_predictions(&actual, &predictions)?;
    let accuracy = confusion_matrix.accuracy();
    info!(rows = actual.len(), accuracy, "Evaluated classifier");

    Ok(Evaluation {
        predictions,
        confusion_matrix,
        accuracy,
    })
}

/// Switches the classifier to inference mode, then evaluates it
///
/// # Returns
/// * `Ok((model, evaluation))` - The frozen model and its test-set evaluation
pub fn evaluate<B: AutodiffBackend>(
    state: ClassifierState<B>,
    x_test: Tensor<B::InnerBackend, 2, Float>,
    y_test: Tensor<B::InnerBackend, 1, Int>,
) -> Result<(DiabetesClassifier<B::InnerBackend>, Evaluation)> {
    let model = state.into_inference();
    let evaluation = evaluate_model(&model, x_test, y_test)?;
    Ok((model, evaluation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiabetesClassifierConfig;
    use burn::backend::{Autodiff, NdArray};

    #[test]
    fn matrix_counts_pairs() {
        let actual = [0, 0, 1, 1, 1, 0];
        let predicted = [0, 1, 1, 0, 1, 0];
        let matrix = ConfusionMatrix::from_predictions(&actual, &predicted).unwrap();

        assert_eq!(matrix.as_array(), [[2, 1], [1, 2]]);
        assert_eq!(matrix.total(), actual.len());
        assert_eq!(
            matrix.accuracy(),
            (matrix.get(0, 0) + matrix.get(1, 1)) as f64 / actual.len() as f64
        );
        assert!((matrix.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((matrix.recall() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_matrix_has_zero_accuracy() {
        let matrix = ConfusionMatrix::from_predictions(&[], &[]).unwrap();
        assert_eq!(matrix.total(), 0);
        assert_eq!(matrix.accuracy(), 0.0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(matches!(
            ConfusionMatrix::from_predictions(&[0, 1], &[0]),
            Err(PipelineError::ShapeMismatch(_))
        ));
        assert!(ConfusionMatrix::from_predictions(&[2], &[0]).is_err());
    }

    #[test]
    fn heatmap_is_annotated_with_counts() {
        let matrix = ConfusionMatrix::from_predictions(&[0, 0, 0, 1, 1], &[0, 0, 1, 1, 1]).unwrap();
        let svg = matrix.to_svg();

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<rect").count(), 4);
        assert!(svg.contains(">2</text>"));
        assert!(svg.contains(">1</text>"));
        assert!(svg.contains(">0</text>"));
        assert!(svg.contains("Diabetic"));
    }

    #[test]
    fn heatmap_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confusion_matrix.svg");
        let matrix = ConfusionMatrix::from_predictions(&[0, 1], &[0, 1]).unwrap();

        matrix.write_heatmap(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), matrix.to_svg());
    }

    #[test]
    fn display_lists_both_classes() {
        let matrix = ConfusionMatrix::from_predictions(&[0, 1], &[1, 1]).unwrap();
        let text = matrix.to_string();
        assert!(text.contains("No Diabetic"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn predictions_match_logit_argmax() {
        let device = Default::default();
        let model = DiabetesClassifierConfig::new().init::<NdArray>(&device);
        let x = Tensor::<NdArray, 2>::random(
            [12, 8],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let logits: Vec<f32> = model.forward(x.clone()).into_data().iter::<f32>().collect();
        let expected: Vec<usize> = logits
            .chunks(2)
            .map(|pair| usize::from(pair[1] > pair[0]))
            .collect();

        assert_eq!(predict(&model, x).unwrap(), expected);
    }

    #[test]
    fn non_finite_logits_are_surfaced() {
        let device = Default::default();
        let model = DiabetesClassifierConfig::new()
            .init_seeded::<NdArray>(0, &device)
            .with_nan_output_bias();
        let x = Tensor::<NdArray, 2>::ones([3, 8], &device);

        assert!(matches!(
            predict(&model, x),
            Err(PipelineError::NumericalInstability(_))
        ));
    }

    #[test]
    fn evaluate_freezes_and_counts_every_row() {
        let device = Default::default();
        let state = ClassifierState::new(
            DiabetesClassifierConfig::new().init::<Autodiff<NdArray>>(&device),
        );
        let x = Tensor::<NdArray, 2>::ones([6, 8], &device);
        let y = Tensor::<NdArray, 1, Int>::from_ints([0, 1, 0, 1, 1, 0], &device);

        let (model, evaluation) = evaluate(state, x.clone(), y).unwrap();

        assert_eq!(evaluation.predictions.len(), 6);
        assert_eq!(evaluation.confusion_matrix.total(), 6);
        assert_eq!(predict(&model, x).unwrap(), evaluation.predictions);
    }
}

use std::io::Write;

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use tempfile::NamedTempFile;

use diabetes_classifier::evaluation::{evaluate, predict};
use diabetes_classifier::{
    ClassifierState, DiabetesClassifierConfig, MissingValuePolicy, PipelineConfig, PipelineError,
    Trainer, TrainingConfig, load_dataset, pipeline, split,
};

type TestBackend = Autodiff<NdArray>;

const HEADER: &str = "Pregnancies,Glucose,BloodPressure,SkinThickness,Insulin,BMI,DiabetesPedigreeFunction,Age,Outcome";

fn write_csv(rows: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}

/// `rows` records whose glucose and BMI columns separate the two classes.
fn separable_rows(rows: usize) -> Vec<String> {
    (0..rows)
        .map(|i| {
            let outcome = i % 2;
            let shift = if outcome == 1 { 1.0 } else { -1.0 };
            format!(
                "{},{},0.1,0.2,0.0,{},0.5,{},{outcome}",
                i % 3,
                shift * 1.5,
                shift * (1.0 + (i % 4) as f32 * 0.1),
                (i % 7) as f32 * 0.1
            )
        })
        .collect()
}

#[test]
fn zero_epochs_predicts_from_initial_parameters() {
    let rows: Vec<String> = (0..10).map(|i| format!("0,0,0,0,0,0,0,0,{}", i % 2)).collect();
    let file = write_csv(&rows);
    let device = Default::default();

    let dataset = load_dataset(file.path()).unwrap();
    assert_eq!(dataset.len(), 10);

    let (x, y) = dataset.to_tensors::<NdArray>(&device).unwrap();
    let split = split::train_test_split(x, y, 0.2, 0).unwrap();
    assert_eq!(split.train_len(), 8);
    assert_eq!(split.test_len(), 2);

    let model = DiabetesClassifierConfig::new().init::<TestBackend>(&device);
    let initial = model.valid();

    let trainer = Trainer::new(TrainingConfig::new().with_epochs(0));
    let (state, losses) = trainer
        .fit(
            ClassifierState::new(model),
            split.x_train.clone(),
            split.y_train.clone(),
        )
        .unwrap();
    assert!(losses.is_empty());

    let (_, evaluation) = evaluate(state, split.x_test.clone(), split.y_test.clone()).unwrap();

    let logits: Vec<f32> = initial
        .forward(split.x_test.clone())
        .into_data()
        .iter::<f32>()
        .collect();
    let expected: Vec<usize> = logits
        .chunks(2)
        .map(|pair| usize::from(pair[1] > pair[0]))
        .collect();

    assert_eq!(evaluation.predictions, expected);
    assert_eq!(predict(&initial, split.x_test).unwrap(), expected);
    // All-zero rows give identical logits, so both test rows get the same class
    assert_eq!(evaluation.predictions[0], evaluation.predictions[1]);
    assert_eq!(evaluation.confusion_matrix.total(), 2);
}

#[test]
fn full_run_on_separable_data() {
    let file = write_csv(&separable_rows(50));
    let dir = tempfile::tempdir().unwrap();
    let heatmap = dir.path().join("heatmap.svg");

    let mut config = PipelineConfig::new()
        .with_seed(3)
        .with_heatmap_path(Some(heatmap.display().to_string()));
    config.training.epochs = 60;

    let report = pipeline::run::<TestBackend>(&config, file.path(), &Default::default()).unwrap();

    assert_eq!(report.train_rows + report.test_rows, 50);
    assert_eq!(report.test_rows, 10);
    assert_eq!(report.num_params, 642);
    assert_eq!(report.class_counts, [25, 25]);
    assert_eq!(report.missing_values.total(), 0);
    assert_eq!(report.losses.len(), 60);
    assert!(report.losses.last().unwrap() < report.losses.first().unwrap());

    let matrix = report.evaluation.confusion_matrix;
    assert_eq!(matrix.total(), report.test_rows);
    assert_eq!(report.evaluation.predictions.len(), report.test_rows);
    assert_eq!(
        report.evaluation.accuracy,
        (matrix.get(0, 0) + matrix.get(1, 1)) as f64 / report.test_rows as f64
    );

    let svg = std::fs::read_to_string(&heatmap).unwrap();
    assert_eq!(svg, matrix.to_svg());
}

#[test]
fn missing_values_follow_the_policy() {
    let mut rows = separable_rows(20);
    rows[4] = "1,,0.1,0.2,0.0,1.2,0.5,0.3,0".to_string();
    let file = write_csv(&rows);

    let mut config = PipelineConfig::new();
    config.training.epochs = 2;

    let err = pipeline::run::<TestBackend>(&config, file.path(), &Default::default()).unwrap_err();
    assert!(matches!(err, PipelineError::DataFormat(_)));

    let config = config.with_missing_values(MissingValuePolicy::DropRows);
    let report = pipeline::run::<TestBackend>(&config, file.path(), &Default::default()).unwrap();

    assert_eq!(report.missing_values.count("Glucose"), Some(1));
    assert_eq!(report.missing_values.total(), 1);
    assert_eq!(report.train_rows + report.test_rows, 19);
}

#[test]
fn malformed_input_aborts_the_run() {
    let file = write_csv(&["1,2,3".to_string()]);
    let err = pipeline::run::<TestBackend>(&PipelineConfig::new(), file.path(), &Default::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::DataFormat(_)));
}

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use burn::{
    backend::{Autodiff, NdArray, ndarray::NdArrayDevice},
    config::Config,
};
use clap::Parser;
use tracing::info;

use diabetes_classifier::{MissingValuePolicy, PipelineConfig, logging, pipeline};

const DEFAULT_HEATMAP: &str = "confusion_matrix.svg";

/// Train and evaluate the diabetes risk classifier on a CSV file
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// CSV with 8 feature columns and an `Outcome` column
    #[arg(short, long, value_name = "PATH", default_value = "./data/diabetes.csv")]
    data: PathBuf,
    /// JSON pipeline config; flags below override its values
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(short, long, value_name = "INT")]
    epochs: Option<usize>,
    #[arg(short, long, value_name = "INT")]
    seed: Option<u64>,
    #[arg(long, value_name = "FLOAT")]
    learning_rate: Option<f64>,
    #[arg(long, value_name = "FLOAT")]
    test_fraction: Option<f64>,
    /// Drop rows with missing values instead of failing
    #[arg(long)]
    drop_missing: bool,
    /// Where to write the confusion-matrix heatmap (SVG) [default: confusion_matrix.svg]
    #[arg(long, value_name = "PATH")]
    heatmap: Option<PathBuf>,
    /// Write the effective config to this path
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .map_err(|e| anyhow!("cannot load config {}: {e:?}", path.display()))?,
            None => PipelineConfig::new(),
        };

        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.training.learning_rate = learning_rate;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(test_fraction) = self.test_fraction {
            config.test_fraction = test_fraction;
        }
        if self.drop_missing {
            config.missing_values = MissingValuePolicy::DropRows;
        }
        if let Some(heatmap) = &self.heatmap {
            config.heatmap_path = Some(heatmap.display().to_string());
        } else if config.heatmap_path.is_none() {
            config.heatmap_path = Some(DEFAULT_HEATMAP.to_string());
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    let config = cli.pipeline_config()?;
    if let Some(path) = &cli.save_config {
        config
            .save(path)
            .with_context(|| format!("cannot save config to {}", path.display()))?;
    }

    let device = NdArrayDevice::Cpu;
    let report = pipeline::run::<Autodiff<NdArray>>(&config, &cli.data, &device)
        .with_context(|| format!("pipeline failed on {}", cli.data.display()))?;

    info!(
        train_rows = report.train_rows,
        test_rows = report.test_rows,
        accuracy = report.evaluation.accuracy,
        "Done"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved_config(heatmap: Option<&str>) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        PipelineConfig::new()
            .with_seed(9)
            .with_heatmap_path(heatmap.map(str::to_string))
            .save(&path)
            .unwrap();
        (dir, path)
    }

    fn resolve(args: &[&str]) -> PipelineConfig {
        let args = std::iter::once("diabetes-classifier").chain(args.iter().copied());
        Cli::try_parse_from(args).unwrap().pipeline_config().unwrap()
    }

    #[test]
    fn heatmap_from_config_file_is_kept() {
        let (_dir, path) = saved_config(Some("from_config.svg"));
        let config = resolve(&["--config", path.to_str().unwrap()]);

        assert_eq!(config.heatmap_path.as_deref(), Some("from_config.svg"));
        assert_eq!(config.seed, 9);
    }

    #[test]
    fn heatmap_flag_overrides_config_file() {
        let (_dir, path) = saved_config(Some("from_config.svg"));
        let config = resolve(&["--config", path.to_str().unwrap(), "--heatmap", "flag.svg"]);

        assert_eq!(config.heatmap_path.as_deref(), Some("flag.svg"));
    }

    #[test]
    fn heatmap_falls_back_to_default() {
        let (_dir, path) = saved_config(None);

        assert_eq!(
            resolve(&["--config", path.to_str().unwrap()]).heatmap_path.as_deref(),
            Some(DEFAULT_HEATMAP)
        );
        assert_eq!(resolve(&[]).heatmap_path.as_deref(), Some(DEFAULT_HEATMAP));
    }

    #[test]
    fn flags_override_training_values() {
        let config = resolve(&["--epochs", "3", "--seed", "5", "--drop-missing"]);

        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.seed, 5);
        assert_eq!(config.missing_values, MissingValuePolicy::DropRows);
    }
}

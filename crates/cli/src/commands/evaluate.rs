//! Score a classifier against a labeled dataset

use anyhow::{Context as _, Result};
use clap::Args;
use formcheck_classifier::{evaluate, OnnxFormClassifier};
use formcheck_common::FormCheckConfig;
use formcheck_dataset::read_dataset_csv;
use std::path::PathBuf;
use tracing::warn;

#[derive(Args)]
pub struct EvaluateCommand {
    /// Labeled dataset CSV
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Classifier model (overrides config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl EvaluateCommand {
    pub fn execute(self, config: FormCheckConfig) -> Result<()> {
        let model = self.model.unwrap_or(config.inference.classifier_model);
        let classifier = OnnxFormClassifier::new(&model)
            .with_context(|| format!("Failed to load classifier from {}", model.display()))?;

        let (samples, stats) = read_dataset_csv(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        if stats.schema_mismatch > 0 {
            warn!("Skipped {} malformed rows", stats.schema_mismatch);
        }
        if samples.is_empty() {
            anyhow::bail!("No samples in {}", self.input.display());
        }

        let report = evaluate(&classifier, &samples).context("Evaluation failed")?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{report}");
        }
        Ok(())
    }
}

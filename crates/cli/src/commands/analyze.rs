//! Offline single-frame assessment

use anyhow::{Context as _, Result};
use clap::Args;
use formcheck_classifier::OnnxFormClassifier;
use formcheck_common::{FormCheckConfig, LandmarkSet};
use formcheck_inference::{DecisionEngine, InferenceVerdict};
use formcheck_pose::OnnxPoseDetector;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct AnalyzeCommand {
    /// Image file
    #[arg(value_name = "IMAGE")]
    input: PathBuf,

    /// Exercise performed in the image
    #[arg(short, long, default_value = "squats")]
    exercise: String,

    /// Classifier model (overrides config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Pose landmark model (overrides config)
    #[arg(long)]
    pose_model: Option<PathBuf>,
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    #[serde(flatten)]
    verdict: &'a InferenceVerdict,
    landmarks: Option<&'a LandmarkSet>,
}

impl AnalyzeCommand {
    pub fn execute(self, mut config: FormCheckConfig) -> Result<()> {
        if let Some(model) = self.model {
            config.inference.classifier_model = model;
        }
        if let Some(model) = self.pose_model {
            config.detector.model_path = model;
        }

        let frame = image::open(&self.input)
            .with_context(|| format!("Failed to open image {}", self.input.display()))?
            .to_rgb8();

        let classifier = OnnxFormClassifier::new(&config.inference.classifier_model)
            .with_context(|| {
                format!(
                    "Failed to load classifier from {}",
                    config.inference.classifier_model.display()
                )
            })?;
        let mut detector = OnnxPoseDetector::new(config.detector.clone()).with_context(|| {
            format!(
                "Failed to load pose model from {}",
                config.detector.model_path.display()
            )
        })?;

        let engine = DecisionEngine::new(Arc::new(classifier), config.inference);
        let verdict = engine
            .analyze(&mut detector, &frame, &self.exercise)
            .context("Analysis failed")?;

        let output = AnalyzeOutput {
            verdict: &verdict,
            landmarks: verdict.landmarks.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

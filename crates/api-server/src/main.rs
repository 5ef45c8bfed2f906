//! API Server Binary Entry Point

use anyhow::Context;
use formcheck_api_server::{start_server, ApiState};
use formcheck_classifier::OnnxFormClassifier;
use formcheck_common::FormCheckConfig;
use formcheck_inference::DecisionEngine;
use formcheck_pose::{LandmarkDetector, OnnxPoseDetector};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formcheck_api_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = FormCheckConfig::load(None).context("Failed to load configuration")?;

    let classifier = OnnxFormClassifier::new(&config.inference.classifier_model).with_context(|| {
        format!(
            "Failed to load classifier from {}",
            config.inference.classifier_model.display()
        )
    })?;
    let engine = DecisionEngine::new(Arc::new(classifier), config.inference.clone());

    let workers = config.server.detector_workers.max(1);
    let detectors = (0..workers)
        .map(|_| {
            OnnxPoseDetector::new(config.detector.clone())
                .map(|d| Box::new(d) as Box<dyn LandmarkDetector>)
        })
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| {
            format!(
                "Failed to load pose model from {}",
                config.detector.model_path.display()
            )
        })?;
    tracing::info!("Created {} detector instance(s)", detectors.len());

    let state = ApiState::new(engine, detectors);

    tracing::info!("Starting FormCheck API Server");
    start_server(&config.server.addr, state).await?;

    Ok(())
}

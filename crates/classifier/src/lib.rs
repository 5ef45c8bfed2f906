//! Form classifier capability
//!
//! The classifier is trained elsewhere (a random forest over the canonical
//! 99-feature schema) and exported to ONNX. This crate loads that artifact and
//! exposes it behind [`FormClassifier`], plus offline evaluation against a
//! labeled dataset.

pub mod evaluation;
pub mod onnx;

pub use evaluation::{evaluate, ClassMetrics, ConfusionMatrix, EvaluationReport};
pub use onnx::{ClassifierError, OnnxFormClassifier};

use formcheck_common::{FeatureVector, Label, Result};
use serde::{Deserialize, Serialize};

/// One classifier decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Label,
    /// Probability of `label`, when the model reports probabilities
    pub confidence: Option<f32>,
}

/// Binary form classifier over canonical feature vectors
///
/// Implementations are loaded once and shared read-only, hence `&self` and
/// `Send + Sync`. Any interior state (such as an ONNX session) is guarded
/// internally.
pub trait FormClassifier: Send + Sync {
    /// Label and confidence from a single model call
    fn classify(&self, features: &FeatureVector) -> Result<Prediction>;

    fn predict(&self, features: &FeatureVector) -> Result<Label> {
        Ok(self.classify(features)?.label)
    }

    /// Probability of the predicted class, `None` without probability output
    fn predict_confidence(&self, features: &FeatureVector) -> Result<Option<f32>> {
        Ok(self.classify(features)?.confidence)
    }

    fn classify_batch(&self, batch: &[FeatureVector]) -> Result<Vec<Prediction>> {
        batch.iter().map(|features| self.classify(features)).collect()
    }
}

impl<C: FormClassifier + ?Sized> FormClassifier for std::sync::Arc<C> {
    fn classify(&self, features: &FeatureVector) -> Result<Prediction> {
        (**self).classify(features)
    }

    fn classify_batch(&self, batch: &[FeatureVector]) -> Result<Vec<Prediction>> {
        (**self).classify_batch(batch)
    }
}

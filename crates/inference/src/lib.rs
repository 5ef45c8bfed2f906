//! Inference decision engine
//!
//! One frame in, one verdict out:
//! 1. detect landmarks; nothing found -> `Undetected` (reported as `"analyzing"`, confidence 0)
//! 2. requested exercise is not the trained one -> `Analyzing`, fixed confidence,
//!    classifier never called
//! 3. build canonical features and classify; label 1 -> `Correct`, 0 -> `Incorrect`
//! 4. attach fixed feedback for (exercise, status)
//!
//! The engine holds no per-request state. The detector is passed in by the
//! caller, so concurrent callers each bring their own detector instance while
//! sharing one engine and classifier.

pub mod feedback;

pub use feedback::{feedback_for, UNDETECTED_FEEDBACK};

use formcheck_classifier::FormClassifier;
use formcheck_common::{InferenceConfig, Label, LandmarkSet, Result};
use formcheck_features::build_canonical_features;
use formcheck_pose::LandmarkDetector;
use image::RgbImage;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Confidence reported when the classifier gives a label without probabilities
pub const FALLBACK_CONFIDENCE: f32 = 1.0;

/// Verdict state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictStatus {
    Correct,
    Incorrect,
    /// Body visible, form not assessed
    Analyzing,
    /// No body in frame
    Undetected,
}

impl VerdictStatus {
    /// Wire status string; `Undetected` reports as `"analyzing"`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictStatus::Correct => "correct",
            VerdictStatus::Incorrect => "incorrect",
            VerdictStatus::Analyzing | VerdictStatus::Undetected => "analyzing",
        }
    }
}

impl From<Label> for VerdictStatus {
    fn from(label: Label) -> Self {
        match label {
            Label::Correct => VerdictStatus::Correct,
            Label::Incorrect => VerdictStatus::Incorrect,
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VerdictStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceVerdict {
    pub status: VerdictStatus,
    /// In `[0, 1]`
    pub confidence: f32,
    pub feedback: String,
    /// Detected landmarks, for overlay drawing
    #[serde(skip)]
    pub landmarks: Option<LandmarkSet>,
}

/// Turns frames into verdicts with a shared classifier
pub struct DecisionEngine {
    classifier: Arc<dyn FormClassifier>,
    config: InferenceConfig,
}

impl DecisionEngine {
    pub fn new(classifier: Arc<dyn FormClassifier>, config: InferenceConfig) -> Self {
        Self { classifier, config }
    }

    #[must_use]
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Detect, gate, classify and attach feedback for one frame
    pub fn analyze(
        &self,
        detector: &mut dyn LandmarkDetector,
        frame: &RgbImage,
        exercise: &str,
    ) -> Result<InferenceVerdict> {
        let landmarks = detector.detect(frame)?;
        self.decide(landmarks, exercise)
    }

    /// Everything after detection
    pub fn decide(&self, landmarks: Option<LandmarkSet>, exercise: &str) -> Result<InferenceVerdict> {
        let Some(landmarks) = landmarks else {
            debug!("No body detected");
            return Ok(self.verdict(VerdictStatus::Undetected, 0.0, exercise, None));
        };

        if exercise != self.config.trained_exercise {
            debug!(
                "Exercise {exercise:?} has no trained model ({:?}), skipping classification",
                self.config.trained_exercise
            );
            return Ok(self.verdict(
                VerdictStatus::Analyzing,
                self.config.analyzing_confidence,
                exercise,
                Some(landmarks),
            ));
        }

        let features = build_canonical_features(&landmarks)?;
        let prediction = self.classifier.classify(&features)?;
        let confidence = prediction.confidence.unwrap_or_else(|| {
            debug!("Classifier reports no probabilities, using confidence {FALLBACK_CONFIDENCE}");
            FALLBACK_CONFIDENCE
        });

        debug!("Predicted {} with confidence {:.3}", prediction.label, confidence);
        Ok(self.verdict(
            prediction.label.into(),
            confidence,
            exercise,
            Some(landmarks),
        ))
    }

    fn verdict(
        &self,
        status: VerdictStatus,
        confidence: f32,
        exercise: &str,
        landmarks: Option<LandmarkSet>,
    ) -> InferenceVerdict {
        InferenceVerdict {
            status,
            confidence,
            feedback: feedback_for(exercise, status, &self.config.trained_exercise),
            landmarks,
        }
    }
}

//! ONNX-backed classifier
//!
//! Expected graph: input `[N, 99]` f32, output 0 labels `[N]` i64, optional
//! output 1 class probabilities `[N, 2]` f32 ordered `[P(0), P(1)]`. Models
//! exported with probability maps instead of a tensor are treated as having no
//! probability output.

use crate::{FormClassifier, Prediction};
use formcheck_common::{FeatureVector, FormCheckError, Label, CANONICAL_FEATURE_WIDTH};
use ndarray::Array2;
use ort::{session::Session, value::TensorRef};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Error types for the ONNX classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Failed to load classifier: {0}")]
    ModelLoad(String),
    #[error("Inference error: {0}")]
    Inference(String),
    #[error("Unexpected classifier output: {0}")]
    InvalidOutput(String),
}

impl From<ClassifierError> for FormCheckError {
    fn from(error: ClassifierError) -> Self {
        FormCheckError::Model(error.to_string())
    }
}

/// Form classifier running an exported ONNX model
pub struct OnnxFormClassifier {
    session: Mutex<Session>,
}

impl OnnxFormClassifier {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self, ClassifierError> {
        info!("Loading form classifier from {:?}", model_path.as_ref());

        let session = Session::builder()
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        info!("Form classifier loaded successfully");

        Ok(Self::from_session(session))
    }

    #[must_use]
    pub fn from_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    fn run(&self, batch: &[FeatureVector]) -> Result<Vec<Prediction>, FormCheckError> {
        let input = to_input_array(batch)?;
        let input_tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Inference("Classifier session lock poisoned".into()))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let (_, labels) = outputs[0].try_extract_tensor::<i64>().map_err(|e| {
            ClassifierError::InvalidOutput(format!("Failed to extract label tensor: {e}"))
        })?;
        let labels = labels.to_vec();

        let probabilities = if outputs.len() > 1 {
            match outputs[1].try_extract_tensor::<f32>() {
                Ok((_, probs)) => Some(probs.to_vec()),
                Err(e) => {
                    debug!("Classifier probability output is not a tensor: {e}");
                    None
                }
            }
        } else {
            None
        };

        decode_predictions(&labels, probabilities.as_deref(), batch.len())
    }
}

impl FormClassifier for OnnxFormClassifier {
    fn classify(&self, features: &FeatureVector) -> formcheck_common::Result<Prediction> {
        let mut predictions = self.run(std::slice::from_ref(features))?;
        predictions
            .pop()
            .ok_or_else(|| ClassifierError::InvalidOutput("Empty prediction".into()).into())
    }

    fn classify_batch(&self, batch: &[FeatureVector]) -> formcheck_common::Result<Vec<Prediction>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.run(batch)
    }
}

/// Stack canonical vectors into an `[N, 99]` input
fn to_input_array(batch: &[FeatureVector]) -> Result<Array2<f32>, FormCheckError> {
    let mut input = Array2::zeros((batch.len(), CANONICAL_FEATURE_WIDTH));
    for (row, features) in batch.iter().enumerate() {
        if !features.is_canonical() {
            return Err(FormCheckError::SchemaMismatch {
                expected: format!("{CANONICAL_FEATURE_WIDTH} features"),
                found: features.len(),
            });
        }
        for (col, value) in features.as_slice().iter().enumerate() {
            input[[row, col]] = *value;
        }
    }
    Ok(input)
}

/// Pair label output with the probability of each predicted class
fn decode_predictions(
    labels: &[i64],
    probabilities: Option<&[f32]>,
    rows: usize,
) -> Result<Vec<Prediction>, FormCheckError> {
    if labels.len() != rows {
        return Err(ClassifierError::InvalidOutput(format!(
            "Expected {rows} labels, got {}",
            labels.len()
        ))
        .into());
    }

    let classes = Label::all().len();
    let probabilities = probabilities.filter(|p| {
        let ok = p.len() == rows * classes;
        if !ok {
            debug!("Ignoring probability output of length {}", p.len());
        }
        ok
    });

    labels
        .iter()
        .enumerate()
        .map(|(row, raw)| {
            let label = u8::try_from(*raw)
                .ok()
                .and_then(Label::from_u8)
                .ok_or_else(|| ClassifierError::InvalidOutput(format!("Unknown class {raw}")))?;
            let confidence =
                probabilities.map(|p| p[row * classes + usize::from(label.as_u8())]);
            Ok(Prediction { label, confidence })
        })
        .collect()
}

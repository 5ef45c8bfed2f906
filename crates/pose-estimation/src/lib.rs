//! Body landmark extraction using a BlazePose-style landmark model via ONNX Runtime
//!
//! The model sees the whole frame resized to a square input and returns 39
//! landmarks (33 body points plus 6 auxiliary ROI points) together with a
//! pose-presence score. Only the 33 body points are kept, normalized to
//! `[0, 1]` relative to the frame.
//!
//! # Model contract
//! - input: `[1, S, S, 3]` RGB, values in `[0, 1]` (`S` = `input_size`, usually 256)
//! - output 0: `[1, 195]`, 39 x `(x, y, z, visibility, presence)` in input pixels,
//!   visibility and presence as logits
//! - output 1: `[1, 1]`, pose-presence score
//!
//! # Example
//! ```no_run
//! use formcheck_common::DetectorConfig;
//! use formcheck_pose::{LandmarkDetector, OnnxPoseDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut detector = OnnxPoseDetector::new(DetectorConfig::default())?;
//!
//! let frame = image::open("frame.jpg")?.to_rgb8();
//! match detector.detect(&frame)? {
//!     Some(landmarks) => println!("{} landmarks", landmarks.len()),
//!     None => println!("nobody in frame"),
//! }
//! # Ok(())
//! # }
//! ```

use formcheck_common::{DetectorConfig, FormCheckError, LandmarkPoint, LandmarkSet, POSE_LANDMARKS};
use image::RgbImage;
use ndarray::Array4;
use ort::{session::Session, value::TensorRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Landmarks emitted by the model, including the 6 auxiliary ROI points
pub const MODEL_LANDMARKS: usize = 39;

/// Values per landmark in the model output
pub const VALUES_PER_LANDMARK: usize = 5;

/// Anything that turns a frame into body landmarks
///
/// `detect` takes `&mut self` because ONNX sessions and tracking detectors
/// carry per-instance state. Callers that share a detector across threads
/// wrap it in a `Mutex`.
pub trait LandmarkDetector: Send {
    /// `Ok(None)` when no body is found in the frame
    fn detect(&mut self, frame: &RgbImage) -> formcheck_common::Result<Option<LandmarkSet>>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, frame: &RgbImage) -> formcheck_common::Result<Option<LandmarkSet>> {
        (**self).detect(frame)
    }
}

/// The 33 body landmarks, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyLandmark {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl BodyLandmark {
    pub const ALL: [BodyLandmark; POSE_LANDMARKS] = [
        BodyLandmark::Nose,
        BodyLandmark::LeftEyeInner,
        BodyLandmark::LeftEye,
        BodyLandmark::LeftEyeOuter,
        BodyLandmark::RightEyeInner,
        BodyLandmark::RightEye,
        BodyLandmark::RightEyeOuter,
        BodyLandmark::LeftEar,
        BodyLandmark::RightEar,
        BodyLandmark::MouthLeft,
        BodyLandmark::MouthRight,
        BodyLandmark::LeftShoulder,
        BodyLandmark::RightShoulder,
        BodyLandmark::LeftElbow,
        BodyLandmark::RightElbow,
        BodyLandmark::LeftWrist,
        BodyLandmark::RightWrist,
        BodyLandmark::LeftPinky,
        BodyLandmark::RightPinky,
        BodyLandmark::LeftIndex,
        BodyLandmark::RightIndex,
        BodyLandmark::LeftThumb,
        BodyLandmark::RightThumb,
        BodyLandmark::LeftHip,
        BodyLandmark::RightHip,
        BodyLandmark::LeftKnee,
        BodyLandmark::RightKnee,
        BodyLandmark::LeftAnkle,
        BodyLandmark::RightAnkle,
        BodyLandmark::LeftHeel,
        BodyLandmark::RightHeel,
        BodyLandmark::LeftFootIndex,
        BodyLandmark::RightFootIndex,
    ];

    /// Landmark at a feature index (0-32)
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BodyLandmark::Nose => "nose",
            BodyLandmark::LeftEyeInner => "left_eye_inner",
            BodyLandmark::LeftEye => "left_eye",
            BodyLandmark::LeftEyeOuter => "left_eye_outer",
            BodyLandmark::RightEyeInner => "right_eye_inner",
            BodyLandmark::RightEye => "right_eye",
            BodyLandmark::RightEyeOuter => "right_eye_outer",
            BodyLandmark::LeftEar => "left_ear",
            BodyLandmark::RightEar => "right_ear",
            BodyLandmark::MouthLeft => "mouth_left",
            BodyLandmark::MouthRight => "mouth_right",
            BodyLandmark::LeftShoulder => "left_shoulder",
            BodyLandmark::RightShoulder => "right_shoulder",
            BodyLandmark::LeftElbow => "left_elbow",
            BodyLandmark::RightElbow => "right_elbow",
            BodyLandmark::LeftWrist => "left_wrist",
            BodyLandmark::RightWrist => "right_wrist",
            BodyLandmark::LeftPinky => "left_pinky",
            BodyLandmark::RightPinky => "right_pinky",
            BodyLandmark::LeftIndex => "left_index",
            BodyLandmark::RightIndex => "right_index",
            BodyLandmark::LeftThumb => "left_thumb",
            BodyLandmark::RightThumb => "right_thumb",
            BodyLandmark::LeftHip => "left_hip",
            BodyLandmark::RightHip => "right_hip",
            BodyLandmark::LeftKnee => "left_knee",
            BodyLandmark::RightKnee => "right_knee",
            BodyLandmark::LeftAnkle => "left_ankle",
            BodyLandmark::RightAnkle => "right_ankle",
            BodyLandmark::LeftHeel => "left_heel",
            BodyLandmark::RightHeel => "right_heel",
            BodyLandmark::LeftFootIndex => "left_foot_index",
            BodyLandmark::RightFootIndex => "right_foot_index",
        }
    }
}

/// Landmark detector backed by an ONNX landmark model
pub struct OnnxPoseDetector {
    session: Session,
    config: DetectorConfig,
}

impl OnnxPoseDetector {
    /// Load the model named in `config.model_path`
    pub fn new(config: DetectorConfig) -> Result<Self, PoseEstimationError> {
        info!("Loading pose landmark model from {:?}", config.model_path);

        let session = Session::builder()
            .map_err(|e| PoseEstimationError::ModelLoad(e.to_string()))?
            .commit_from_file(&config.model_path)
            .map_err(|e| PoseEstimationError::ModelLoad(e.to_string()))?;

        info!("Pose landmark model loaded successfully");

        Ok(Self { session, config })
    }

    /// Wrap an already-built session
    #[must_use]
    pub fn from_session(session: Session, config: DetectorConfig) -> Self {
        Self { session, config }
    }

    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run detection with a caller-owned session
    pub fn detect_with_session(
        session: &mut Session,
        image: &RgbImage,
        config: &DetectorConfig,
    ) -> Result<Option<LandmarkSet>, PoseEstimationError> {
        debug!(
            "Running landmark detection on {}x{} frame",
            image.width(),
            image.height()
        );

        let input = preprocess(image, config.input_size);
        let input_tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| PoseEstimationError::Inference(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| PoseEstimationError::Inference(e.to_string()))?;

        if outputs.len() < 2 {
            return Err(PoseEstimationError::InvalidOutput(format!(
                "Expected landmark and presence outputs, got {} output(s)",
                outputs.len()
            )));
        }

        let (shape, landmarks) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            PoseEstimationError::Inference(format!("Failed to extract landmark tensor: {e}"))
        })?;
        debug!("Landmark output shape: {:?}", shape);

        let (_, flag) = outputs[1].try_extract_tensor::<f32>().map_err(|e| {
            PoseEstimationError::Inference(format!("Failed to extract presence tensor: {e}"))
        })?;
        let presence = flag.first().copied().ok_or_else(|| {
            PoseEstimationError::InvalidOutput("Empty presence tensor".to_string())
        })?;

        decode_landmarks(landmarks, presence, config)
    }
}

impl LandmarkDetector for OnnxPoseDetector {
    fn detect(&mut self, frame: &RgbImage) -> formcheck_common::Result<Option<LandmarkSet>> {
        Ok(Self::detect_with_session(&mut self.session, frame, &self.config)?)
    }
}

/// Resize the frame to the model's square input, NHWC, values in `[0, 1]`
#[must_use]
pub fn preprocess(image: &RgbImage, input_size: u32) -> Array4<f32> {
    let resized = image::imageops::resize(
        image,
        input_size,
        input_size,
        image::imageops::FilterType::Triangle,
    );

    let size = input_size as usize;
    let mut input = Array4::zeros((1, size, size, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, y as usize, x as usize, c]] = f32::from(pixel[c]) / 255.0;
        }
    }
    input
}

/// Turn raw model output into a landmark set
///
/// Returns `None` when the presence score is below the configured threshold.
/// Coordinates are divided by the input size, so they are relative to the
/// original frame (the frame was stretched, not letterboxed).
pub fn decode_landmarks(
    raw: &[f32],
    presence: f32,
    config: &DetectorConfig,
) -> Result<Option<LandmarkSet>, PoseEstimationError> {
    let expected = MODEL_LANDMARKS * VALUES_PER_LANDMARK;
    if raw.len() != expected {
        return Err(PoseEstimationError::InvalidOutput(format!(
            "Expected {expected} landmark values, got {}",
            raw.len()
        )));
    }

    if presence < config.presence_threshold {
        debug!(
            "Pose presence {:.3} below threshold {:.3}",
            presence, config.presence_threshold
        );
        return Ok(None);
    }

    let scale = config.input_size as f32;
    let points = raw
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(POSE_LANDMARKS)
        .map(|v| LandmarkPoint::new(v[0] / scale, v[1] / scale, v[2] / scale, sigmoid(v[3])))
        .collect();

    LandmarkSet::new(points)
        .map(Some)
        .map_err(|e| PoseEstimationError::InvalidOutput(e.to_string()))
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Error types for landmark detection
#[derive(Debug, Error)]
pub enum PoseEstimationError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Inference error: {0}")]
    Inference(String),
    #[error("Unexpected model output: {0}")]
    InvalidOutput(String),
}

impl From<PoseEstimationError> for FormCheckError {
    fn from(error: PoseEstimationError) -> Self {
        FormCheckError::Detector(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_output(input_size: f32) -> Vec<f32> {
        let mut raw = Vec::with_capacity(MODEL_LANDMARKS * VALUES_PER_LANDMARK);
        for i in 0..MODEL_LANDMARKS {
            let i = i as f32;
            raw.extend_from_slice(&[i * 4.0, input_size - i * 2.0, -i, 0.0, 5.0]);
        }
        raw
    }

    #[test]
    fn test_body_landmark_from_index() {
        assert_eq!(BodyLandmark::from_index(0), Some(BodyLandmark::Nose));
        assert_eq!(BodyLandmark::from_index(11), Some(BodyLandmark::LeftShoulder));
        assert_eq!(BodyLandmark::from_index(25), Some(BodyLandmark::LeftKnee));
        assert_eq!(BodyLandmark::from_index(32), Some(BodyLandmark::RightFootIndex));
        assert_eq!(BodyLandmark::from_index(33), None);
        assert!(BodyLandmark::ALL.iter().enumerate().all(|(i, l)| l.index() == i));
    }

    #[test]
    fn test_body_landmark_serializes_snake_case() {
        let json = serde_json::to_string(&BodyLandmark::LeftFootIndex).unwrap();
        assert_eq!(json, "\"left_foot_index\"");
        assert_eq!(BodyLandmark::LeftFootIndex.as_str(), "left_foot_index");
    }

    #[test]
    fn test_decode_keeps_33_body_landmarks() {
        let config = DetectorConfig::default();
        let raw = raw_output(256.0);

        let set = decode_landmarks(&raw, 0.9, &config).unwrap().unwrap();
        assert_eq!(set.len(), 33);

        let knee = set.points()[BodyLandmark::LeftKnee.index()];
        assert!((knee.x - 25.0 * 4.0 / 256.0).abs() < 1e-6);
        assert!((knee.y - (256.0 - 50.0) / 256.0).abs() < 1e-6);
        assert!((knee.z + 25.0 / 256.0).abs() < 1e-6);
        assert!((knee.visibility - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_below_presence_threshold_is_none() {
        let raw = raw_output(256.0);
        assert!(decode_landmarks(&raw, 0.4, &DetectorConfig::default())
            .unwrap()
            .is_none());
        assert!(decode_landmarks(&raw, 0.6, &DetectorConfig::strict())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_rejects_wrong_output_size() {
        let err = decode_landmarks(&[0.0; 99], 1.0, &DetectorConfig::default()).unwrap_err();
        assert!(matches!(err, PoseEstimationError::InvalidOutput(_)));
        assert!(matches!(
            FormCheckError::from(err),
            FormCheckError::Detector(_)
        ));
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let image = RgbImage::from_pixel(64, 48, image::Rgb([255, 0, 128]));
        let input = preprocess(&image, 32);
        assert_eq!(input.shape(), &[1, 32, 32, 3]);
        assert!((input[[0, 10, 10, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(input[[0, 10, 10, 1]], 0.0);
        assert!((input[[0, 31, 31, 2]] - 128.0 / 255.0).abs() < 1e-6);
    }
}

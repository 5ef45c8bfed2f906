/// Common types and utilities for the form-check pipeline
pub mod config;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use config::{
    DatasetConfig, DetectorConfig, FormCheckConfig, InferenceConfig, LabelMapping, ServerConfig,
};

/// Landmarks produced by the live pose detector
pub const POSE_LANDMARKS: usize = 33;

/// Landmarks in the extended layout found in older sample stores
pub const EXTENDED_LANDMARKS: usize = 44;

/// Values stored per landmark (x, y, z)
pub const COORDS_PER_LANDMARK: usize = 3;

/// Feature width accepted for training and inference (33 x 3)
pub const CANONICAL_FEATURE_WIDTH: usize = POSE_LANDMARKS * COORDS_PER_LANDMARK;

/// Feature width of the extended layout (44 x 3)
pub const EXTENDED_FEATURE_WIDTH: usize = EXTENDED_LANDMARKS * COORDS_PER_LANDMARK;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum FormCheckError {
    #[error("Input format error: {0}")]
    InputFormat(String),

    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<image::ImageError> for FormCheckError {
    fn from(err: image::ImageError) -> Self {
        FormCheckError::InputFormat(err.to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, FormCheckError>;

/// Binary form label. The numeric encoding (Correct=1, Incorrect=0) is what
/// datasets, models and API payloads carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    Incorrect = 0,
    Correct = 1,
}

impl Label {
    /// Numeric class value
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a numeric class value
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Label::Incorrect),
            1 => Some(Label::Correct),
            _ => None,
        }
    }

    /// Lowercase name used in reports and feedback keys
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Correct => "correct",
            Label::Incorrect => "incorrect",
        }
    }

    /// Both labels, in class-index order
    #[must_use]
    pub fn all() -> [Label; 2] {
        [Label::Incorrect, Label::Correct]
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.as_u8()
    }
}

impl TryFrom<u8> for Label {
    type Error = FormCheckError;

    fn try_from(value: u8) -> Result<Self> {
        Label::from_u8(value)
            .ok_or_else(|| FormCheckError::InputFormat(format!("Invalid label value: {value}")))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single detected body point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    /// X coordinate (normalized 0-1 relative to frame width)
    pub x: f32,
    /// Y coordinate (normalized 0-1 relative to frame height)
    pub y: f32,
    /// Depth relative to the hips
    pub z: f32,
    /// Detection confidence (0-1)
    pub visibility: f32,
}

impl LandmarkPoint {
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }
}

/// Supported landmark layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkLayout {
    /// 33 landmarks, the live detector configuration
    Pose33,
    /// 44 landmarks, found in historically collected samples
    Extended44,
}

impl LandmarkLayout {
    /// Layout for a landmark count, if it is one of the known sizes
    #[must_use]
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            POSE_LANDMARKS => Some(LandmarkLayout::Pose33),
            EXTENDED_LANDMARKS => Some(LandmarkLayout::Extended44),
            _ => None,
        }
    }

    /// Number of landmarks in this layout
    #[must_use]
    pub fn landmark_count(self) -> usize {
        match self {
            LandmarkLayout::Pose33 => POSE_LANDMARKS,
            LandmarkLayout::Extended44 => EXTENDED_LANDMARKS,
        }
    }

    /// Width of the flattened feature vector
    #[must_use]
    pub fn feature_width(self) -> usize {
        self.landmark_count() * COORDS_PER_LANDMARK
    }
}

/// Ordered landmarks for one frame. Index i is always the same anatomical point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    /// Wrap detector output, rejecting any landmark count other than 33 or 44
    pub fn new(points: Vec<LandmarkPoint>) -> Result<Self> {
        if LandmarkLayout::from_count(points.len()).is_none() {
            return Err(FormCheckError::SchemaMismatch {
                expected: format!("{POSE_LANDMARKS} or {EXTENDED_LANDMARKS} landmarks"),
                found: points.len(),
            });
        }
        Ok(Self { points })
    }

    #[must_use]
    pub fn layout(&self) -> LandmarkLayout {
        // Length is validated on construction
        if self.points.len() == EXTENDED_LANDMARKS {
            LandmarkLayout::Extended44
        } else {
            LandmarkLayout::Pose33
        }
    }

    #[must_use]
    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Flattened landmark coordinates in landmark-major order (x0,y0,z0,x1,...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    /// Wrap values whose width is one of the known schemas (99 or 132)
    pub fn new(values: Vec<f32>) -> Result<Self> {
        match values.len() {
            CANONICAL_FEATURE_WIDTH | EXTENDED_FEATURE_WIDTH => Ok(Self { values }),
            found => Err(FormCheckError::SchemaMismatch {
                expected: format!("{CANONICAL_FEATURE_WIDTH} or {EXTENDED_FEATURE_WIDTH} features"),
                found,
            }),
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.values.len() == CANONICAL_FEATURE_WIDTH
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = FormCheckError;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        FeatureVector::new(values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(vector: FeatureVector) -> Self {
        vector.values
    }
}

/// Where a sample came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleSource {
    /// Top-level class directory (or label name for tabular imports)
    pub class_dir: String,
    /// Recording the sample belongs to (session subfolder or video stem)
    pub session: String,
    /// File the sample was read or extracted from
    pub path: PathBuf,
}

/// Feature vector with its label and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: Label,
    pub source: SampleSource,
}

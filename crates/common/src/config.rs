//! Pipeline configuration
//!
//! Loaded from a YAML file (every field optional), then overridden by
//! environment variables:
//! - `FORMCHECK_CONFIG`: config file path when none is given explicitly
//! - `FORMCHECK_ADDR`: server bind address
//! - `FORMCHECK_MODEL`: classifier model path

use crate::{FormCheckError, Label, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormCheckConfig {
    pub dataset: DatasetConfig,
    pub inference: InferenceConfig,
    pub detector: DetectorConfig,
    pub server: ServerConfig,
}

impl FormCheckConfig {
    /// Parse a YAML configuration file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| {
            FormCheckError::Config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Load from an explicit path, else `FORMCHECK_CONFIG`, else defaults,
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os("FORMCHECK_CONFIG").map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_yaml(&path)?
            }
            None => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("FORMCHECK_ADDR") {
            self.server.addr = addr;
        }
        if let Some(model) = std::env::var_os("FORMCHECK_MODEL") {
            self.inference.classifier_model = PathBuf::from(model);
        }
    }
}

/// Explicit mapping from class directory name to label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMapping(BTreeMap<String, Label>);

impl LabelMapping {
    pub fn new(entries: impl IntoIterator<Item = (String, Label)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// `Valid -> 1`, `Invalid -> 0` (stored landmark dumps)
    #[must_use]
    pub fn stored_default() -> Self {
        Self::new([
            ("Valid".to_string(), Label::Correct),
            ("Invalid".to_string(), Label::Incorrect),
        ])
    }

    /// `Correct -> 1`, `Incorrect -> 0` (video folders)
    #[must_use]
    pub fn video_default() -> Self {
        Self::new([
            ("Correct".to_string(), Label::Correct),
            ("Incorrect".to_string(), Label::Incorrect),
        ])
    }

    #[must_use]
    pub fn label_for(&self, directory: &str) -> Option<Label> {
        self.0.get(directory).copied()
    }

    /// Entries in directory-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Label)> {
        self.0.iter().map(|(dir, label)| (dir.as_str(), *label))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail fast unless both labels are mapped and every mapped directory
    /// exists under `root`
    pub fn validate(&self, root: &Path) -> Result<()> {
        for label in Label::all() {
            if !self.0.values().any(|l| *l == label) {
                return Err(FormCheckError::Config(format!(
                    "Label mapping has no directory for label {} ({label})",
                    label.as_u8()
                )));
            }
        }
        let missing: Vec<String> = self
            .0
            .keys()
            .filter(|dir| !root.join(dir).is_dir())
            .map(|dir| root.join(dir).display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FormCheckError::Config(format!(
                "Class directories not found: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// Offline dataset assembly settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// The one dataset file training and evaluation read
    pub output_csv: PathBuf,
    /// Root of per-class directories holding session folders of `.npy` dumps
    pub stored_root: PathBuf,
    pub stored_labels: LabelMapping,
    /// Root of per-class directories holding videos
    pub video_root: PathBuf,
    pub video_labels: LabelMapping,
    /// Video file extensions (matched case-insensitively)
    pub video_extensions: Vec<String>,
    /// Values beyond +/- this bound are counted as outliers
    pub outlier_bound: f32,
    /// Columns with variance below this are flagged as low-variance
    pub low_variance_threshold: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            output_csv: PathBuf::from("Dataset/squat_dataset.csv"),
            stored_root: PathBuf::from("Squat_Data"),
            stored_labels: LabelMapping::stored_default(),
            video_root: PathBuf::from("Dataset/Videos"),
            video_labels: LabelMapping::video_default(),
            video_extensions: ["mp4", "mov", "avi", "mkv"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            outlier_bound: 2.0,
            low_variance_threshold: 0.001,
        }
    }
}

/// Decision engine and model locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Classifier exported to ONNX
    pub classifier_model: PathBuf,
    /// Exercise the classifier was trained for
    pub trained_exercise: String,
    /// Confidence reported for exercises without a trained model
    pub analyzing_confidence: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            classifier_model: PathBuf::from("models/squat_classifier.onnx"),
            trained_exercise: "squats".to_string(),
            analyzing_confidence: 0.5,
        }
    }
}

/// Pose landmark model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Landmark model exported to ONNX
    pub model_path: PathBuf,
    /// Square input resolution of the landmark model
    pub input_size: u32,
    /// Minimum pose-presence score for a frame to count as a detection
    pub presence_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/pose_landmark_full.onnx"),
            input_size: 256,
            presence_threshold: 0.5,
        }
    }
}

impl DetectorConfig {
    /// Stricter presence gate, fewer false detections on cluttered frames
    #[must_use]
    pub fn strict() -> Self {
        Self {
            presence_threshold: 0.8,
            ..Self::default()
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Detector instances created at startup, one per concurrent request
    pub detector_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
            detector_workers: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = FormCheckConfig::default();
        assert_eq!(config.inference.trained_exercise, "squats");
        assert_eq!(config.inference.analyzing_confidence, 0.5);
        assert_eq!(config.detector.input_size, 256);
        assert_eq!(config.dataset.video_extensions.len(), 4);
        assert_eq!(
            config.dataset.stored_labels.label_for("Valid"),
            Some(Label::Correct)
        );
        assert_eq!(
            config.dataset.video_labels.label_for("Incorrect"),
            Some(Label::Incorrect)
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("formcheck.yaml");
        std::fs::write(
            &path,
            "dataset:\n  output_csv: data/out.csv\n  stored_labels:\n    Good: 1\n    Bad: 0\nserver:\n  detector_workers: 2\n",
        )
        .unwrap();

        let config = FormCheckConfig::from_yaml(&path).unwrap();
        assert_eq!(config.dataset.output_csv, PathBuf::from("data/out.csv"));
        assert_eq!(config.dataset.stored_labels.label_for("Good"), Some(Label::Correct));
        assert_eq!(config.dataset.stored_labels.label_for("Valid"), None);
        assert_eq!(config.server.detector_workers, 2);
        assert_eq!(config.server.addr, "0.0.0.0:8000");
        assert_eq!(config.inference.trained_exercise, "squats");
    }

    #[test]
    fn test_invalid_label_value_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "dataset:\n  stored_labels:\n    Valid: 3\n").unwrap();
        assert!(matches!(
            FormCheckConfig::from_yaml(&path),
            Err(FormCheckError::Config(_))
        ));
    }

    #[test]
    fn test_label_mapping_validation() {
        let dir = TempDir::new().unwrap();
        let mapping = LabelMapping::stored_default();

        let err = mapping.validate(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Valid"));

        std::fs::create_dir(dir.path().join("Valid")).unwrap();
        std::fs::create_dir(dir.path().join("Invalid")).unwrap();
        assert!(mapping.validate(dir.path()).is_ok());

        let one_sided = LabelMapping::new([("Valid".to_string(), Label::Correct)]);
        assert!(matches!(
            one_sided.validate(dir.path()),
            Err(FormCheckError::Config(_))
        ));
    }
}

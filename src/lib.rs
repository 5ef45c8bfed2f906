//! FormCheck: exercise form assessment from body landmarks
//!
//! Umbrella crate over the workspace members:
//! - [`pose`]: landmark detection on RGB frames
//! - [`features`]: landmark sets to fixed-width feature vectors, schema normalization
//! - [`classifier`]: binary form classifier and its evaluation
//! - [`dataset`]: offline dataset assembly and diagnostics
//! - [`inference`]: per-frame decision engine and feedback

pub use formcheck_classifier as classifier;
pub use formcheck_common as common;
pub use formcheck_dataset as dataset;
pub use formcheck_features as features;
pub use formcheck_inference as inference;
pub use formcheck_pose as pose;

pub use formcheck_common::{FormCheckConfig, FormCheckError, Result};

//! Feature extraction contract for pose landmarks
//!
//! Two pieces live here:
//! - [`builder`]: flattens a [`LandmarkSet`](formcheck_common::LandmarkSet) into a
//!   landmark-major `x0,y0,z0,x1,...` [`FeatureVector`](formcheck_common::FeatureVector)
//! - [`schema`]: reconciles the 99- and 132-wide sample stores into the canonical
//!   99-feature training schema, and names tabular columns
//!
//! # Example
//! ```
//! use formcheck_common::{LandmarkPoint, LandmarkSet};
//! use formcheck_features::{build_feature_vector, normalize};
//!
//! # fn main() -> formcheck_common::Result<()> {
//! let points = vec![LandmarkPoint::new(0.5, 0.4, -0.1, 0.9); 33];
//! let set = LandmarkSet::new(points)?;
//! let features = build_feature_vector(&set)?;
//! assert_eq!(features.len(), 99);
//!
//! let canonical = normalize(&vec![0.0f32; 132])?;
//! assert_eq!(canonical.len(), 99);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod schema;

pub use builder::{build_canonical_features, build_feature_vector};
pub use schema::{
    classify_width, feature_columns, header_row, normalize, normalize_csv, NormalizeCsvSummary,
    WidthClass,
};

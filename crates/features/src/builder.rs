//! Landmark set to feature vector flattening

use crate::schema::normalize;
use formcheck_common::{FeatureVector, FormCheckError, LandmarkSet, Result, COORDS_PER_LANDMARK};

/// Flatten landmarks into `x0,y0,z0,x1,y1,z1,...`
///
/// Visibility is not part of the feature schema. No scaling is applied beyond
/// what the detector already did. Non-finite coordinates are rejected rather
/// than replaced.
pub fn build_feature_vector(landmarks: &LandmarkSet) -> Result<FeatureVector> {
    let mut values = Vec::with_capacity(landmarks.len() * COORDS_PER_LANDMARK);
    for (index, point) in landmarks.points().iter().enumerate() {
        if !(point.x.is_finite() && point.y.is_finite() && point.z.is_finite()) {
            return Err(FormCheckError::InputFormat(format!(
                "Landmark {index} has non-finite coordinates ({}, {}, {})",
                point.x, point.y, point.z
            )));
        }
        values.extend_from_slice(&[point.x, point.y, point.z]);
    }
    FeatureVector::new(values)
}

/// Flatten and bring the result to the canonical 99-feature schema
pub fn build_canonical_features(landmarks: &LandmarkSet) -> Result<FeatureVector> {
    let features = build_feature_vector(landmarks)?;
    if features.is_canonical() {
        Ok(features)
    } else {
        normalize(features.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_common::LandmarkPoint;

    fn landmark_set(n: usize) -> LandmarkSet {
        let points = (0..n)
            .map(|i| {
                let i = i as f32;
                LandmarkPoint::new(i * 0.01, 0.5 + i * 0.001, -i * 0.1, 0.99)
            })
            .collect();
        LandmarkSet::new(points).unwrap()
    }

    #[test]
    fn test_landmark_major_ordering() {
        let set = landmark_set(33);
        let features = build_feature_vector(&set).unwrap();
        assert_eq!(features.len(), 99);

        let values = features.as_slice();
        for (i, point) in set.points().iter().enumerate() {
            assert_eq!(values[3 * i], point.x);
            assert_eq!(values[3 * i + 1], point.y);
            assert_eq!(values[3 * i + 2], point.z);
        }
    }

    #[test]
    fn test_extended_layout_width() {
        let features = build_feature_vector(&landmark_set(44)).unwrap();
        assert_eq!(features.len(), 132);
    }

    #[test]
    fn test_canonical_features_truncate_extended_layout() {
        let set = landmark_set(44);
        let full = build_feature_vector(&set).unwrap();
        let canonical = build_canonical_features(&set).unwrap();
        assert_eq!(canonical.len(), 99);
        assert_eq!(canonical.as_slice(), &full.as_slice()[..99]);
    }

    #[test]
    fn test_non_finite_coordinates_rejected() {
        let mut points = vec![LandmarkPoint::new(0.1, 0.2, 0.3, 1.0); 33];
        points[7].y = f32::NAN;
        let set = LandmarkSet::new(points).unwrap();

        let err = build_feature_vector(&set).unwrap_err();
        assert!(matches!(err, FormCheckError::InputFormat(_)));
        assert!(err.to_string().contains("Landmark 7"));
    }
}

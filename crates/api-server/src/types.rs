//! API request and response types

use formcheck_inference::InferenceVerdict;
use formcheck_pose::BodyLandmark;
use serde::{Deserialize, Serialize};

/// Single-frame analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzePoseRequest {
    /// Base64 image, optionally as a `data:image/...;base64,` URL
    pub image: String,
    /// Exercise the user selected, e.g. `"squats"`
    #[serde(alias = "exerciseType")]
    pub exercise_type: String,
}

/// Body point in pixel coordinates of the submitted image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Landmark visibility
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Single-frame analysis response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePoseResponse {
    /// `"correct"`, `"incorrect"` or `"analyzing"`
    pub status: String,
    pub confidence: f32,
    /// Repetition counting is not tracked per frame
    pub rep_completed: bool,
    pub keypoints: Vec<Keypoint>,
    pub feedback: String,
}

impl AnalyzePoseResponse {
    /// Scale normalized landmarks to the `width` x `height` image
    #[must_use]
    pub fn from_verdict(verdict: &InferenceVerdict, width: u32, height: u32) -> Self {
        let keypoints = verdict
            .landmarks
            .as_ref()
            .map(|set| {
                set.points()
                    .iter()
                    .enumerate()
                    .map(|(index, point)| Keypoint {
                        x: point.x * width as f32,
                        y: point.y * height as f32,
                        score: point.visibility,
                        name: BodyLandmark::from_index(index).map(|l| l.as_str().to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            status: verdict.status.as_str().to_string(),
            confidence: verdict.confidence,
            rep_completed: false,
            keypoints,
            feedback: verdict.feedback.clone(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_common::{LandmarkPoint, LandmarkSet};
    use formcheck_inference::VerdictStatus;

    fn verdict(landmarks: Option<LandmarkSet>) -> InferenceVerdict {
        InferenceVerdict {
            status: VerdictStatus::Correct,
            confidence: 0.75,
            feedback: "ok".to_string(),
            landmarks,
        }
    }

    #[test]
    fn test_keypoints_scaled_to_pixels() {
        let set = LandmarkSet::new(vec![LandmarkPoint::new(0.5, 0.25, 0.1, 0.8); 33]).unwrap();
        let response = AnalyzePoseResponse::from_verdict(&verdict(Some(set)), 640, 480);

        assert_eq!(response.keypoints.len(), 33);
        assert_eq!(response.keypoints[0].x, 320.0);
        assert_eq!(response.keypoints[0].y, 120.0);
        assert_eq!(response.keypoints[0].score, 0.8);
        assert_eq!(response.keypoints[0].name.as_deref(), Some("nose"));
        assert!(!response.rep_completed);
    }

    #[test]
    fn test_extended_points_have_no_name() {
        let set = LandmarkSet::new(vec![LandmarkPoint::new(0.1, 0.1, 0.0, 0.5); 44]).unwrap();
        let response = AnalyzePoseResponse::from_verdict(&verdict(Some(set)), 10, 10);
        assert_eq!(response.keypoints.len(), 44);
        assert!(response.keypoints[43].name.is_none());
    }

    #[test]
    fn test_wire_field_names() {
        let response = AnalyzePoseResponse::from_verdict(&verdict(None), 10, 10);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "correct");
        assert_eq!(json["repCompleted"], false);
        assert_eq!(json["keypoints"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_request_accepts_camel_case_exercise() {
        let request: AnalyzePoseRequest =
            serde_json::from_str(r#"{"image":"abc","exerciseType":"squats"}"#).unwrap();
        assert_eq!(request.exercise_type, "squats");
    }
}

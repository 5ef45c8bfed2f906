//! Integration tests for the API server
//!
//! Each test binds the router to an ephemeral port, backed by stand-in
//! detector and classifier, and talks to it over real HTTP.

use base64::{engine::general_purpose, Engine};
use formcheck_api_server::{build_router, ApiState};
use formcheck_classifier::{FormClassifier, Prediction};
use formcheck_common::{
    FeatureVector, FormCheckError, InferenceConfig, Label, LandmarkPoint, LandmarkSet, Result,
};
use formcheck_inference::DecisionEngine;
use formcheck_pose::LandmarkDetector;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Body found unless the frame is black
struct StubDetector;

impl LandmarkDetector for StubDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>> {
        if frame.pixels().all(|p| p.0 == [0, 0, 0]) {
            return Ok(None);
        }
        LandmarkSet::new(vec![LandmarkPoint::new(0.5, 0.25, 0.0, 0.9); 33]).map(Some)
    }
}

struct FailingDetector;

impl LandmarkDetector for FailingDetector {
    fn detect(&mut self, _: &RgbImage) -> Result<Option<LandmarkSet>> {
        Err(FormCheckError::Detector("model crashed".to_string()))
    }
}

struct StubClassifier {
    calls: AtomicUsize,
}

impl FormClassifier for StubClassifier {
    fn classify(&self, _: &FeatureVector) -> Result<Prediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Prediction {
            label: Label::Incorrect,
            confidence: Some(0.8),
        })
    }
}

async fn spawn_server(detectors: Vec<Box<dyn LandmarkDetector>>) -> (String, Arc<StubClassifier>) {
    let classifier = Arc::new(StubClassifier {
        calls: AtomicUsize::new(0),
    });
    let engine = DecisionEngine::new(classifier.clone(), InferenceConfig::default());
    let app = build_router(ApiState::new(engine, detectors));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    (format!("http://{addr}"), classifier)
}

fn stub_detectors(n: usize) -> Vec<Box<dyn LandmarkDetector>> {
    (0..n)
        .map(|_| Box::new(StubDetector) as Box<dyn LandmarkDetector>)
        .collect()
}

fn encoded_frame(pixel: [u8; 3]) -> String {
    let image = RgbImage::from_pixel(200, 100, Rgb(pixel));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

async fn analyze(base: &str, image: String, exercise: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/api/v1/analyze_pose"))
        .json(&serde_json::json!({ "image": image, "exercise_type": exercise }))
        .send()
        .await
        .expect("Failed to send analyze request")
}

#[tokio::test]
async fn test_health_endpoint() {
    let (base, _) = spawn_server(stub_detectors(1)).await;

    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_squat_frame_is_classified() {
    let (base, classifier) = spawn_server(stub_detectors(2)).await;

    let response = analyze(&base, encoded_frame([120, 120, 120]), "squats").await;
    assert_eq!(response.status(), 200);

    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["status"], "incorrect");
    assert!((json["confidence"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    assert_eq!(json["repCompleted"], false);
    assert!(json["feedback"]
        .as_str()
        .unwrap()
        .starts_with("Try to improve your squat"));

    let keypoints = json["keypoints"].as_array().unwrap();
    assert_eq!(keypoints.len(), 33);
    assert_eq!(keypoints[0]["x"], 100.0);
    assert_eq!(keypoints[0]["y"], 25.0);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_undetected_frame() {
    let (base, classifier) = spawn_server(stub_detectors(1)).await;

    let json: serde_json::Value = analyze(&base, encoded_frame([0, 0, 0]), "squats")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(json["status"], "analyzing");
    assert_eq!(json["confidence"], 0.0);
    assert!(json["keypoints"].as_array().unwrap().is_empty());
    assert!(json["feedback"].as_str().unwrap().contains("Step back"));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_untrained_exercise_skips_classifier() {
    let (base, classifier) = spawn_server(stub_detectors(1)).await;

    let json: serde_json::Value = analyze(&base, encoded_frame([90, 90, 90]), "knee-flexion")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(json["status"], "analyzing");
    assert_eq!(json["confidence"], 0.5);
    assert_eq!(json["keypoints"].as_array().unwrap().len(), 33);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bad_payloads_are_rejected() {
    let (base, classifier) = spawn_server(stub_detectors(1)).await;

    let response = analyze(&base, "%%%".to_string(), "squats").await;
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "Invalid base64 image data");

    let not_an_image = general_purpose::STANDARD.encode(b"hello");
    let response = analyze(&base, not_an_image, "squats").await;
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "Could not decode image");

    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_detector_failure_is_server_error() {
    let (base, _) = spawn_server(vec![Box::new(FailingDetector)]).await;

    let response = analyze(&base, encoded_frame([50, 50, 50]), "squats").await;
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_concurrent_requests_share_detector_slots() {
    let (base, classifier) = spawn_server(stub_detectors(2)).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let base = base.clone();
            tokio::spawn(async move {
                analyze(&base, encoded_frame([70, 70, 70]), "squats")
                    .await
                    .status()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 8);
}

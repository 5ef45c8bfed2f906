//! REST API server for single-frame form assessment
//!
//! Clients post one camera frame at a time together with the exercise they
//! selected and get back a verdict, feedback and the detected keypoints.

mod handlers;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use formcheck_common::{FormCheckError, Result};
use formcheck_inference::{DecisionEngine, InferenceVerdict};
use formcheck_pose::LandmarkDetector;
use image::RgbImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub use handlers::*;
pub use types::*;

/// Fixed set of detector instances, handed out round-robin
///
/// Each slot is locked for the duration of one detection; a request landing
/// on a busy slot waits for it.
pub struct DetectorPool {
    slots: Vec<Mutex<Box<dyn LandmarkDetector>>>,
    next: AtomicUsize,
}

impl DetectorPool {
    #[must_use]
    pub fn new(detectors: Vec<Box<dyn LandmarkDetector>>) -> Self {
        Self {
            slots: detectors.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Run `f` with the next detector slot; blocks while that slot is busy
    pub fn with_detector<T>(
        &self,
        f: impl FnOnce(&mut dyn LandmarkDetector) -> Result<T>,
    ) -> Result<T> {
        if self.slots.is_empty() {
            return Err(FormCheckError::Detector(
                "No detector instances configured".to_string(),
            ));
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        debug!("Using detector slot {index}");

        let mut detector = self.slots[index].lock().map_err(|_| {
            FormCheckError::Detector(format!("Detector slot {index} is poisoned"))
        })?;
        f(&mut **detector)
    }
}

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Classifier-backed decision engine, shared by all requests
    pub engine: Arc<DecisionEngine>,
    pub detectors: Arc<DetectorPool>,
}

impl ApiState {
    #[must_use]
    pub fn new(engine: DecisionEngine, detectors: Vec<Box<dyn LandmarkDetector>>) -> Self {
        Self {
            engine: Arc::new(engine),
            detectors: Arc::new(DetectorPool::new(detectors)),
        }
    }

    /// Blocking; call from `spawn_blocking`
    pub fn analyze(&self, frame: &RgbImage, exercise: &str) -> Result<InferenceVerdict> {
        self.detectors
            .with_detector(|detector| self.engine.analyze(detector, frame, exercise))
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/analyze_pose", post(analyze_pose))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> std::result::Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}

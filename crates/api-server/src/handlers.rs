//! HTTP request handlers for API endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use base64::{engine::general_purpose, Engine};
use image::RgbImage;
use tracing::{error, info, warn};

use crate::{AnalyzePoseRequest, AnalyzePoseResponse, ApiState};

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(crate::types::HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Assess one frame
///
/// Undecodable images are rejected with 400 before any model runs. Detector
/// and classifier failures surface as 500.
pub async fn analyze_pose(
    State(state): State<ApiState>,
    Json(request): Json<AnalyzePoseRequest>,
) -> Result<Json<AnalyzePoseResponse>, (StatusCode, String)> {
    let frame = decode_frame(&request.image)?;
    let (width, height) = frame.dimensions();
    let exercise = request.exercise_type;
    info!(
        "Analyze request: exercise={}, frame={}x{}",
        exercise, width, height
    );

    let verdict = tokio::task::spawn_blocking(move || state.analyze(&frame, &exercise))
        .await
        .map_err(|e| {
            error!("Analysis task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Analysis task failed".to_string(),
            )
        })?
        .map_err(|e| {
            error!("Analysis failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Analysis failed: {e}"),
            )
        })?;

    info!(
        "Verdict: status={}, confidence={:.3}",
        verdict.status, verdict.confidence
    );
    Ok(Json(AnalyzePoseResponse::from_verdict(
        &verdict, width, height,
    )))
}

/// Base64 (or data URL) payload to an RGB frame
pub fn decode_frame(payload: &str) -> Result<RgbImage, (StatusCode, String)> {
    let encoded = payload
        .split_once(',')
        .map_or(payload, |(_, data)| data)
        .trim();

    let bytes = general_purpose::STANDARD.decode(encoded).map_err(|e| {
        warn!("Rejecting request with invalid base64: {}", e);
        (
            StatusCode::BAD_REQUEST,
            "Invalid base64 image data".to_string(),
        )
    })?;

    let image = image::load_from_memory(&bytes).map_err(|e| {
        warn!("Rejecting request with undecodable image: {}", e);
        (StatusCode::BAD_REQUEST, "Could not decode image".to_string())
    })?;

    Ok(image.to_rgb8())
}

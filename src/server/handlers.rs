//! Request handlers for the three JSON endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::catalog::Track;
use crate::error::ApiError;
use crate::generation;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.model_loaded(),
    })
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub description: String,
    pub duration: Option<f64>,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub message: String,
    pub file_name: String,
    pub audio_url: String,
}

/// Generates a track and persists it as a WAV artifact.
///
/// Validation happens before the engine is consulted; a generation
/// failure is terminal for the request (no retry). Old artifacts are
/// pruned best-effort afterwards and can never fail the response.
pub async fn generate_music(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let prepared = generation::prepare(
        &state.config,
        &payload.description,
        payload.duration,
        payload.file_name.as_deref(),
    )?;

    let manager = state.manager.as_ref().ok_or(ApiError::ModelUnavailable)?;
    let audio = manager
        .generate(&prepared.description, prepared.duration_s)
        .await?;

    let path = state.store.save_wav(&prepared.file_name, audio).await?;
    state.store.cleanup_old().await;

    Ok(Json(GenerateResponse {
        message: format!("Music generated and saved to {}", path.display()),
        audio_url: format!("/generated/{}", prepared.file_name),
        file_name: prepared.file_name,
    }))
}

fn default_query() -> String {
    "music".to_string()
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct TracksQuery {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TracksResponse {
    pub tracks: Vec<Track>,
}

pub async fn catalog_tracks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TracksQuery>,
) -> Result<Json<TracksResponse>, ApiError> {
    let limit = params.limit.clamp(1, state.config.max_catalog_limit);
    let tracks = state
        .registry
        .search(params.source.as_deref(), &params.query, limit)
        .await?;

    Ok(Json(TracksResponse { tracks }))
}

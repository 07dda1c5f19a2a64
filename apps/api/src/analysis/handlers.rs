//! Axum route handlers for the Analysis API.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use tracing::debug;

use crate::errors::PipelineError;
use crate::models::report::{AnalysisReport, SkillCatalog};
use crate::state::AppState;
use crate::upload::multipart::{read_upload, UploadLimits};
use crate::upload::validation::NO_FILE_MESSAGE;

/// POST /api/analyze
///
/// Multipart body: file field `resume`, optional text field `jobDescription`.
/// A body that is not multipart at all is treated as "no file uploaded".
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisReport>, PipelineError> {
    let multipart = multipart.map_err(|rejection| {
        debug!("Analyze request without a multipart body: {rejection}");
        PipelineError::validation(NO_FILE_MESSAGE)
    })?;

    let limits = UploadLimits {
        file_bytes: state.config.max_upload_bytes,
        job_description_bytes: state.config.max_job_description_bytes,
    };
    let request = read_upload(multipart, limits).await?;
    let report = state.pipeline.run(request).await?;

    Ok(Json(report))
}

/// GET /api/skills
///
/// The skills the engine can detect, straight from the engine.
/// Unreachable stays a 503; anything else the engine reports is a skills failure.
pub async fn handle_skills(
    State(state): State<AppState>,
) -> Result<Json<SkillCatalog>, PipelineError> {
    let catalog = state
        .engine
        .skills()
        .await
        .map_err(|e| match PipelineError::from(e) {
            PipelineError::EngineError(detail) => PipelineError::SkillsLookup(detail),
            other => other,
        })?;
    Ok(Json(catalog))
}

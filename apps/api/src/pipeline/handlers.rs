use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::match_record::MatchRow;
use crate::scoring::assessment::AssessmentSummary;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateMatchRequest {
    pub resume_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct CreateMatchResponse {
    pub match_id: Uuid,
}

/// A match plus whatever structure could be read out of its assessment.
#[derive(Serialize)]
pub struct MatchDetail {
    #[serde(flatten)]
    pub record: MatchRow,
    pub assessment: Option<AssessmentSummary>,
}

/// POST /api/v1/matches
/// Accepted, not done: the caller polls `GET /api/v1/matches/:id`.
pub async fn handle_create_match(
    State(state): State<AppState>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<CreateMatchResponse>), AppError> {
    let (Some(resume_id), Some(job_id)) = (req.resume_id, req.job_id) else {
        return Err(AppError::Validation(
            "resume_id and job_id required".to_string(),
        ));
    };
    let match_id = state.submitter.submit(resume_id, job_id).await?;
    Ok((StatusCode::ACCEPTED, Json(CreateMatchResponse { match_id })))
}

/// GET /api/v1/matches
pub async fn handle_list_matches(
    State(state): State<AppState>,
) -> Result<Json<Vec<MatchRow>>, AppError> {
    Ok(Json(state.store.list_matches().await?))
}

/// GET /api/v1/matches/:id
pub async fn handle_get_match(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchDetail>, AppError> {
    let record = state
        .store
        .get_match(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {id} not found")))?;
    let assessment = record.llm_result.as_deref().and_then(AssessmentSummary::parse);
    Ok(Json(MatchDetail { record, assessment }))
}

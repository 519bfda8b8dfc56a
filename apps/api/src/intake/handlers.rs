use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::intake::{parse_upload, sanitize_filename, save_upload};
use crate::models::job::JobDescriptionRow;
use crate::models::resume::{ParsedResume, ResumeRow, ResumeSummary};
use crate::state::AppState;

/// Multipart field carrying the resume file.
const RESUME_FIELD: &str = "resume";
const DEFAULT_JOB_TITLE: &str = "Untitled";

#[derive(Serialize)]
pub struct UploadResumeResponse {
    pub resume_id: Uuid,
    pub parsed_preview: ParsedResume,
}

/// POST /api/v1/resumes
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResumeResponse>), AppError> {
    let (filename, bytes) = read_resume_field(&mut multipart).await?.ok_or_else(|| {
        AppError::Validation(format!("provide resume file under \"{RESUME_FIELD}\""))
    })?;

    let (text, parsed) = parse_upload(bytes.clone(), filename.clone(), state.parser.clone()).await;
    let preview = parsed
        .clone()
        .unwrap_or_else(|| ParsedResume::fallback(&text));

    let resume = ResumeRow::new(filename, text, parsed);
    save_upload(&state.upload_dir, resume.id, &resume.filename, &bytes).await?;
    state.store.create_resume(&resume).await?;
    info!(resume_id = %resume.id, filename = %resume.filename, "Resume stored");

    Ok((
        StatusCode::CREATED,
        Json(UploadResumeResponse {
            resume_id: resume.id,
            parsed_preview: preview,
        }),
    ))
}

async fn read_resume_field(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(RESUME_FIELD) {
            continue;
        }
        let filename = sanitize_filename(field.file_name().unwrap_or_default());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read upload: {e}")))?;
        return Ok(Some((filename, bytes)));
    }
    Ok(None)
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResumeSummary>>, AppError> {
    Ok(Json(state.store.list_resumes().await?))
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct CreateJobResponse {
    pub job_id: Uuid,
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), AppError> {
    let title = req
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_JOB_TITLE.to_string());
    let job = JobDescriptionRow::new(title, req.description.unwrap_or_default());
    state.store.create_job(&job).await?;
    info!(job_id = %job.id, title = %job.title, "Job description stored");

    Ok((StatusCode::CREATED, Json(CreateJobResponse { job_id: job.id })))
}

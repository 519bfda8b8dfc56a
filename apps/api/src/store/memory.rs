use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::JobDescriptionRow;
use crate::models::match_record::{MatchRow, MatchUpdate};
use crate::models::resume::{ParsedResume, ResumeRow, ResumeSummary};
use crate::store::{MatchStore, StoreError};

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    resumes: RwLock<HashMap<Uuid, ResumeRow>>,
    jobs: RwLock<HashMap<Uuid, JobDescriptionRow>>,
    matches: RwLock<HashMap<Uuid, MatchRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn get_resume(&self, id: Uuid) -> Result<Option<ResumeRow>, StoreError> {
        Ok(self.resumes.read().await.get(&id).cloned())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobDescriptionRow>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn get_match(&self, id: Uuid) -> Result<Option<MatchRow>, StoreError> {
        Ok(self.matches.read().await.get(&id).cloned())
    }

    async fn create_match(&self, resume_id: Uuid, job_id: Uuid) -> Result<Uuid, StoreError> {
        let row = MatchRow::queued(resume_id, job_id);
        let id = row.id;
        self.matches.write().await.insert(id, row);
        Ok(id)
    }

    async fn update_match(&self, id: Uuid, update: &MatchUpdate) -> Result<(), StoreError> {
        let mut matches = self.matches.write().await;
        let row = matches.get_mut(&id).ok_or(StoreError::MatchNotFound(id))?;
        row.apply(update, Utc::now());
        Ok(())
    }

    async fn update_resume_parsed(
        &self,
        id: Uuid,
        parsed: &ParsedResume,
    ) -> Result<bool, StoreError> {
        let mut resumes = self.resumes.write().await;
        let row = resumes.get_mut(&id).ok_or(StoreError::ResumeNotFound(id))?;
        if row.parsed.is_some() {
            return Ok(false);
        }
        row.parsed = Some(sqlx::types::Json(parsed.clone()));
        Ok(true)
    }

    async fn create_resume(&self, resume: &ResumeRow) -> Result<(), StoreError> {
        self.resumes
            .write()
            .await
            .insert(resume.id, resume.clone());
        Ok(())
    }

    async fn create_job(&self, job: &JobDescriptionRow) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn list_resumes(&self) -> Result<Vec<ResumeSummary>, StoreError> {
        let resumes = self.resumes.read().await;
        let mut summaries: Vec<ResumeSummary> = resumes.values().map(ResumeSummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn list_matches(&self) -> Result<Vec<MatchRow>, StoreError> {
        let matches = self.matches.read().await;
        let mut rows: Vec<MatchRow> = matches.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

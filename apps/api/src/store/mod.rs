//! Match Record Store: persistence contract the pipeline relies on.
//!
//! Two backends: `PgStore` (PostgreSQL via sqlx) and `MemoryStore`
//! (process-local, used without `DATABASE_URL` and in tests).
//! `AppState` and the worker hold an `Arc<dyn MatchStore>`.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::job::JobDescriptionRow;
use crate::models::match_record::{MatchRow, MatchUpdate};
use crate::models::resume::{ParsedResume, ResumeRow, ResumeSummary};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("match {0} does not exist")]
    MatchNotFound(Uuid),

    #[error("resume {0} does not exist")]
    ResumeNotFound(Uuid),
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_resume(&self, id: Uuid) -> Result<Option<ResumeRow>, StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<JobDescriptionRow>, StoreError>;

    async fn get_match(&self, id: Uuid) -> Result<Option<MatchRow>, StoreError>;

    /// Inserts a new match in `queued` with all scores null and returns its id.
    async fn create_match(&self, resume_id: Uuid, job_id: Uuid) -> Result<Uuid, StoreError>;

    /// Partial update; fields left as `None` in `update` are untouched.
    async fn update_match(&self, id: Uuid, update: &MatchUpdate) -> Result<(), StoreError>;

    /// Stores the parsed structure only if none exists yet.
    /// Returns `false` when a structure was already present.
    async fn update_resume_parsed(
        &self,
        id: Uuid,
        parsed: &ParsedResume,
    ) -> Result<bool, StoreError>;

    async fn create_resume(&self, resume: &ResumeRow) -> Result<(), StoreError>;

    async fn create_job(&self, job: &JobDescriptionRow) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_resumes(&self) -> Result<Vec<ResumeSummary>, StoreError>;

    /// Newest first.
    async fn list_matches(&self) -> Result<Vec<MatchRow>, StoreError>;
}

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::job::JobDescriptionRow;
use crate::models::match_record::{MatchRow, MatchStatus, MatchUpdate};
use crate::models::resume::{ParsedResume, ResumeRow, ResumeSummary};
use crate::store::{MatchStore, StoreError};

/// PostgreSQL-backed store. Every call checks a connection out of the pool for
/// that single statement, so the request handlers and the worker never share
/// a session.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

const MAX_CONNECTIONS: u32 = 10;

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and brings the schema up to date.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to apply database migrations")?;

        info!(max_connections = MAX_CONNECTIONS, "PostgreSQL pool ready, migrations applied");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl MatchStore for PgStore {
    async fn get_resume(&self, id: Uuid) -> Result<Option<ResumeRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobDescriptionRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, JobDescriptionRow>("SELECT * FROM job_descriptions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_match(&self, id: Uuid) -> Result<Option<MatchRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_match(&self, resume_id: Uuid, job_id: Uuid) -> Result<Uuid, StoreError> {
        let row = MatchRow::queued(resume_id, job_id);
        sqlx::query(
            r#"
            INSERT INTO matches (id, resume_id, job_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(row.id)
        .bind(row.resume_id)
        .bind(row.job_id)
        .bind(MatchStatus::Queued.as_str())
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(row.id)
    }

    async fn update_match(&self, id: Uuid, update: &MatchUpdate) -> Result<(), StoreError> {
        // Each nullable column carries a "touch" flag so NULL can be written
        // explicitly without clobbering columns the caller left alone.
        let result = sqlx::query(
            r#"
            UPDATE matches SET
                status          = COALESCE($2, status),
                lexical_score   = CASE WHEN $3 THEN $4 ELSE lexical_score END,
                embedding_score = CASE WHEN $5 THEN $6 ELSE embedding_score END,
                llm_result      = CASE WHEN $7 THEN $8 ELSE llm_result END,
                updated_at      = GREATEST(updated_at, now())
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.lexical_score.is_some())
        .bind(update.lexical_score.flatten())
        .bind(update.embedding_score.is_some())
        .bind(update.embedding_score.flatten())
        .bind(update.llm_result.is_some())
        .bind(update.llm_result.clone().flatten())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MatchNotFound(id));
        }
        Ok(())
    }

    async fn update_resume_parsed(
        &self,
        id: Uuid,
        parsed: &ParsedResume,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE resumes SET parsed = $2 WHERE id = $1 AND parsed IS NULL")
            .bind(id)
            .bind(Json(parsed))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM resumes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::ResumeNotFound(id)),
        }
    }

    async fn create_resume(&self, resume: &ResumeRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO resumes (id, filename, raw_text, parsed, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(resume.id)
        .bind(&resume.filename)
        .bind(&resume.raw_text)
        .bind(resume.parsed.as_ref().map(|p| Json(&p.0)))
        .bind(resume.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_job(&self, job: &JobDescriptionRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO job_descriptions (id, title, description, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_resumes(&self) -> Result<Vec<ResumeSummary>, StoreError> {
        Ok(sqlx::query_as::<_, ResumeSummary>(
            "SELECT id, filename, created_at FROM resumes ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_matches(&self) -> Result<Vec<MatchRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, MatchRow>("SELECT * FROM matches ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs against a real database only when `DATABASE_URL` is set.
    async fn test_store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        Some(PgStore::connect(&url).await.unwrap())
    }

    #[tokio::test]
    async fn test_partial_update_leaves_untouched_columns_alone() {
        let Some(store) = test_store().await else {
            return;
        };
        let id = store
            .create_match(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();

        let scores = MatchUpdate {
            lexical_score: Some(Some(0.4)),
            embedding_score: Some(Some(0.9)),
            llm_result: Some(Some("Score: 7".to_string())),
            ..MatchUpdate::status(MatchStatus::Running)
        };
        store.update_match(id, &scores).await.unwrap();

        // Only the embedding score is touched, and explicitly nulled.
        let clear_embedding = MatchUpdate {
            embedding_score: Some(None),
            ..MatchUpdate::default()
        };
        store.update_match(id, &clear_embedding).await.unwrap();

        let row = store.get_match(id).await.unwrap().unwrap();
        assert_eq!(row.status, MatchStatus::Running);
        assert_eq!(row.lexical_score, Some(0.4));
        assert_eq!(row.embedding_score, None);
        assert_eq!(row.llm_result.as_deref(), Some("Score: 7"));
    }

    #[tokio::test]
    async fn test_updated_at_never_moves_backwards() {
        let Some(store) = test_store().await else {
            return;
        };
        let id = store
            .create_match(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();

        // A clock ahead of the database must not be rolled back by the next write.
        let ahead = chrono::Utc::now() + chrono::Duration::hours(1);
        sqlx::query("UPDATE matches SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(ahead)
            .execute(&store.pool)
            .await
            .unwrap();

        store
            .update_match(id, &MatchUpdate::status(MatchStatus::Done))
            .await
            .unwrap();

        let row = store.get_match(id).await.unwrap().unwrap();
        assert_eq!(row.status, MatchStatus::Done);
        assert!(row.updated_at >= ahead - chrono::Duration::milliseconds(1));
        assert!(row.updated_at >= row.created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_match_is_not_found() {
        let Some(store) = test_store().await else {
            return;
        };
        let err = store
            .update_match(Uuid::new_v4(), &MatchUpdate::status(MatchStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MatchNotFound(_)));
    }

    #[tokio::test]
    async fn test_resume_parsed_is_write_once() {
        let Some(store) = test_store().await else {
            return;
        };
        let resume = ResumeRow::new("cv.txt".into(), "Rust".into(), None);
        store.create_resume(&resume).await.unwrap();

        let first = ParsedResume::fallback("Rust");
        assert!(store.update_resume_parsed(resume.id, &first).await.unwrap());
        let second = ParsedResume {
            skills: vec!["Go".to_string()],
            ..ParsedResume::fallback("Rust")
        };
        assert!(!store.update_resume_parsed(resume.id, &second).await.unwrap());

        let stored = store.get_resume(resume.id).await.unwrap().unwrap();
        assert_eq!(stored.parsed(), Some(&first));

        let err = store
            .update_resume_parsed(Uuid::new_v4(), &first)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ResumeNotFound(_)));
    }
}

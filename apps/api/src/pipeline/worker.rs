//! Worker: the single consumer of the job queue and sole owner of match
//! status transitions after creation.
//!
//! Per dequeued id:
//! 1. unknown match → discarded silently
//! 2. `running` persisted
//! 3. resume or job missing → `failed`, no strategy is called
//! 4. unparsed resume → minimal fallback structure persisted
//! 5. scoring aggregator
//! 6. results + `done`, however many strategies failed
//! 7. anything else that goes wrong (store errors, panics) → `failed` with the
//!    error text, and the loop moves on

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::match_record::{MatchStatus, MatchUpdate};
use crate::models::resume::{ParsedResume, ResumeRow};
use crate::pipeline::queue::JobQueue;
use crate::scoring::ScoringAggregator;
use crate::store::{MatchStore, StoreError};

/// Pause after a failed `pop` so a broken queue backend is not hammered.
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// What happened to one dequeued match id.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The match no longer exists.
    Stale,
    /// The resume or job it references does not exist.
    MissingReference,
    /// Scored and marked `done`.
    Scored { failed_strategies: usize },
    /// Orchestration failed; the match was forced to `failed`.
    Errored(String),
}

#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn MatchStore>,
    queue: Arc<dyn JobQueue>,
    aggregator: ScoringAggregator,
}

impl Worker {
    pub fn new(
        store: Arc<dyn MatchStore>,
        queue: Arc<dyn JobQueue>,
        aggregator: ScoringAggregator,
    ) -> Self {
        Self {
            store,
            queue,
            aggregator,
        }
    }

    /// Drains the queue until it is closed.
    pub async fn run(self) {
        info!("Match worker started");
        loop {
            let match_id = match self.queue.pop().await {
                Ok(Some(id)) => id,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to dequeue match, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => continue,
                        _ = self.queue.until_closed() => break,
                    }
                }
            };
            self.handle(match_id).await;
        }
        info!("Match worker stopped");
    }

    /// One loop iteration. Never returns an error: anything escaping
    /// `process`, including a panic, forces the match to `failed`.
    pub async fn handle(&self, match_id: Uuid) -> JobOutcome {
        debug!(%match_id, "Dequeued match");

        let worker = self.clone();
        let joined = tokio::spawn(async move { worker.process(match_id).await }).await;

        let reason = match joined {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("match processing panicked: {e}"),
        };

        error!(%match_id, error = %reason, "Match processing failed");
        if let Err(e) = self
            .store
            .update_match(match_id, &MatchUpdate::failed_with(reason.clone()))
            .await
        {
            error!(%match_id, error = %e, "Could not record match failure");
        }
        JobOutcome::Errored(reason)
    }

    /// Steps 1–6. Errors returned here are orchestration failures.
    pub async fn process(&self, match_id: Uuid) -> Result<JobOutcome, StoreError> {
        let Some(record) = self.store.get_match(match_id).await? else {
            debug!(%match_id, "Discarding stale queue entry");
            return Ok(JobOutcome::Stale);
        };

        if !record.status.can_transition_to(MatchStatus::Running) {
            // No double-enqueue guard exists: a re-enqueued match is scored
            // again from scratch and its previous results overwritten.
            warn!(
                %match_id,
                status = %record.status,
                terminal = record.status.is_terminal(),
                "Re-processing a match that is not queued"
            );
        }

        self.store
            .update_match(match_id, &MatchUpdate::status(MatchStatus::Running))
            .await?;
        info!(%match_id, status = %MatchStatus::Running, "Match started");

        let resume = self.store.get_resume(record.resume_id).await?;
        let job = self.store.get_job(record.job_id).await?;
        let (resume, job) = match (resume, job) {
            (Some(resume), Some(job)) => (resume, job),
            (resume, _) => {
                let reason = if resume.is_none() {
                    format!("resume {} not found", record.resume_id)
                } else {
                    format!("job {} not found", record.job_id)
                };
                warn!(%match_id, %reason, "Match references missing data");
                self.store
                    .update_match(match_id, &MatchUpdate::failed_with(reason))
                    .await?;
                return Ok(JobOutcome::MissingReference);
            }
        };

        let parsed = self.ensure_parsed(&resume).await?;

        let card = self
            .aggregator
            .score(&resume.raw_text, &job.description, &parsed.skills)
            .await;
        let failed_strategies = card.failures();

        self.store
            .update_match(match_id, &card.into_update())
            .await?;
        info!(
            %match_id,
            status = %MatchStatus::Done,
            failed_strategies,
            "Match scored"
        );

        Ok(JobOutcome::Scored { failed_strategies })
    }

    /// Returns the resume's parsed structure, persisting the minimal fallback
    /// the first time a resume without one is processed.
    async fn ensure_parsed(&self, resume: &ResumeRow) -> Result<ParsedResume, StoreError> {
        if let Some(parsed) = resume.parsed() {
            return Ok(parsed.clone());
        }

        let fallback = ParsedResume::fallback(&resume.raw_text);
        if self
            .store
            .update_resume_parsed(resume.id, &fallback)
            .await?
        {
            debug!(resume_id = %resume.id, "Stored fallback parsed structure");
            return Ok(fallback);
        }

        // Someone filled it between our read and write; theirs wins.
        let current = self.store.get_resume(resume.id).await?;
        Ok(current
            .and_then(|r| r.parsed().cloned())
            .unwrap_or(fallback))
    }
}

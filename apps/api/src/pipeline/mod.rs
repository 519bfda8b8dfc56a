// Asynchronous match pipeline: queue, single worker, and the service object
// that owns both. HTTP handlers only ever see `MatchSubmitter`.

pub mod handlers;
pub mod queue;
pub mod worker;

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::scoring::ScoringAggregator;
use crate::store::{MatchStore, StoreError};
use queue::{JobQueue, QueueError};
use worker::Worker;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The match row exists (still `queued`) but never reached the queue.
    #[error("match {match_id} was created but could not be enqueued: {source}")]
    Enqueue {
        match_id: Uuid,
        #[source]
        source: QueueError,
    },
}

/// Owns the queue and the worker task. Created once at startup; `shutdown`
/// closes the queue and waits for the in-flight match to finish.
pub struct MatchPipeline {
    store: Arc<dyn MatchStore>,
    queue: Arc<dyn JobQueue>,
    worker: JoinHandle<()>,
}

impl MatchPipeline {
    /// Spawns the worker on the current runtime.
    pub fn start(
        store: Arc<dyn MatchStore>,
        queue: Arc<dyn JobQueue>,
        aggregator: ScoringAggregator,
    ) -> Self {
        let worker = Worker::new(store.clone(), queue.clone(), aggregator);
        let worker = tokio::spawn(worker.run());
        Self {
            store,
            queue,
            worker,
        }
    }

    pub fn submitter(&self) -> MatchSubmitter {
        MatchSubmitter {
            store: self.store.clone(),
            queue: self.queue.clone(),
        }
    }

    pub async fn shutdown(self) {
        info!("Shutting down match pipeline");
        self.queue.close();
        if let Err(e) = self.worker.await {
            error!(error = %e, "Match worker task ended abnormally");
        }
    }
}

/// Creates matches and enqueues them. Cheap to clone; lives in `AppState`.
#[derive(Clone)]
pub struct MatchSubmitter {
    store: Arc<dyn MatchStore>,
    queue: Arc<dyn JobQueue>,
}

impl MatchSubmitter {
    /// Commits a `queued` match, then enqueues its id. Fire-and-forget: the
    /// caller polls the store for the outcome.
    pub async fn submit(&self, resume_id: Uuid, job_id: Uuid) -> Result<Uuid, SubmitError> {
        let match_id = self.store.create_match(resume_id, job_id).await?;
        self.queue
            .push(match_id)
            .await
            .map_err(|source| SubmitError::Enqueue { match_id, source })?;
        info!(%match_id, %resume_id, %job_id, "Match enqueued");
        Ok(match_id)
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use crate::parser::ResumeParser;
use crate::pipeline::MatchSubmitter;
use crate::store::MatchStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MatchStore>,
    /// Front door of the match pipeline; the worker itself is owned by `main`.
    pub submitter: MatchSubmitter,
    pub parser: Arc<ResumeParser>,
    pub upload_dir: PathBuf,
}

pub mod health;

use std::path::Path;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::{ServeDir, ServeFile};

use crate::intake::handlers as intake;
use crate::pipeline::handlers as matches;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Intake
        .route(
            "/api/v1/resumes",
            post(intake::handle_upload_resume).get(intake::handle_list_resumes),
        )
        .route("/api/v1/jobs", post(intake::handle_create_job))
        // Matching
        .route(
            "/api/v1/matches",
            post(matches::handle_create_match).get(matches::handle_list_matches),
        )
        .route("/api/v1/matches/:id", get(matches::handle_get_match))
        .with_state(state)
}

/// Serves a built single-page frontend for every path the API does not
/// claim. Unknown paths get `index.html` so client-side routing works.
pub fn with_frontend(router: Router, dir: &Path) -> Router {
    let index = ServeFile::new(dir.join("index.html"));
    router.fallback_service(ServeDir::new(dir).fallback(index))
}

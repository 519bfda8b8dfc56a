use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::embeddings::{DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL};

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a number does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent: matches live in process memory.
    pub database_url: Option<String>,
    /// Absent: the in-process queue is used.
    pub redis_url: Option<String>,
    pub redis_queue_key: String,
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub llm_max_attempts: u32,
    pub http_timeout: Duration,
    pub upload_dir: PathBuf,
    pub skills_file: Option<PathBuf>,
    pub frontend_dir: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            redis_queue_key: env_or("REDIS_QUEUE_KEY", "fitscore:matches"),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            embedding_model: env_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            llm_max_attempts: env_or("LLM_MAX_ATTEMPTS", "1")
                .parse::<u32>()
                .context("LLM_MAX_ATTEMPTS must be a positive integer")?,
            http_timeout: Duration::from_secs(
                env_or("HTTP_TIMEOUT_SECS", "120")
                    .parse::<u64>()
                    .context("HTTP_TIMEOUT_SECS must be a number of seconds")?,
            ),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            skills_file: optional_env("SKILLS_FILE").map(PathBuf::from),
            frontend_dir: optional_env("FRONTEND_DIR").map(PathBuf::from),
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are treated alike.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

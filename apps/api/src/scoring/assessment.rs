//! Narrative assessment: asks the chat provider for a scored, justified
//! verdict. The reply is stored verbatim; readers parse it (see `AssessmentSummary`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompts::{assessment_system, build_assessment_prompt};
use super::ScoringError;
use crate::llm_client::{LlmClient, LlmError};

/// Anything that can answer a prompt with free text.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl ChatProvider for LlmClient {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        LlmClient::complete(self, prompt, system).await
    }
}

pub async fn assess(
    provider: &dyn ChatProvider,
    resume_text: &str,
    job_description: &str,
    skills: &[String],
) -> Result<String, ScoringError> {
    let prompt = build_assessment_prompt(resume_text, job_description, skills);
    Ok(provider.complete(&prompt, &assessment_system()).await?)
}

/// Best-effort structured view of a stored assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub score: Option<f64>,
    #[serde(default)]
    pub justification: Vec<String>,
    #[serde(default)]
    pub matched_skills: Vec<String>,
}

impl AssessmentSummary {
    /// Parses the assessment when the model answered with JSON (optionally
    /// fenced). Error strings and free prose yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(unfence(text)).ok()
    }
}

/// Body of a Markdown code fence (any info string), or the trimmed input.
fn unfence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

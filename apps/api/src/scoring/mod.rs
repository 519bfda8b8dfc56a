//! Scoring Aggregator: runs the three fit strategies for one resume/job pair.
//!
//! Each strategy returns its own `Result`; a failure stays inside its slot of
//! the `ScoreCard` and never reaches the other two. The card is then folded
//! into a single `MatchUpdate`:
//!
//! | strategy   | success          | failure                    |
//! |------------|------------------|----------------------------|
//! | lexical    | score in [0, 1]  | `null`                     |
//! | embedding  | score in [-1, 1] | `null`                     |
//! | assessment | provider text    | `"LLM error: <reason>"`    |

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::llm_client::LlmError;
use crate::models::match_record::{MatchStatus, MatchUpdate};

pub mod assessment;
pub mod embedding;
pub mod lexical;
pub mod prompts;

pub use assessment::ChatProvider;
pub use embedding::EmbeddingProvider;

/// Strategy-local failure. Recorded as a sentinel, never escalated.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("empty vocabulary: neither text contains a scorable term")]
    EmptyVocabulary,

    #[error("zero-magnitude vector")]
    ZeroVector,

    #[error("vector dimensions differ ({0} vs {1})")]
    DimensionMismatch(usize, usize),

    #[error("similarity is not a finite number")]
    NonFinite,

    #[error(transparent)]
    Provider(#[from] LlmError),
}

/// Outcome of every strategy for one match.
#[derive(Debug)]
pub struct ScoreCard {
    pub lexical: Result<f64, ScoringError>,
    pub embedding: Result<f64, ScoringError>,
    pub assessment: Result<String, ScoringError>,
}

impl ScoreCard {
    /// Number of strategies that failed.
    pub fn failures(&self) -> usize {
        [
            self.lexical.is_err(),
            self.embedding.is_err(),
            self.assessment.is_err(),
        ]
        .into_iter()
        .filter(|failed| *failed)
        .count()
    }

    /// Final write for a scored match: all three result fields plus `done`.
    pub fn into_update(self) -> MatchUpdate {
        MatchUpdate {
            status: Some(MatchStatus::Done),
            lexical_score: Some(self.lexical.ok()),
            embedding_score: Some(self.embedding.ok()),
            llm_result: Some(Some(
                self.assessment.unwrap_or_else(|e| format!("LLM error: {e}")),
            )),
        }
    }
}

#[derive(Clone)]
pub struct ScoringAggregator {
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
}

impl ScoringAggregator {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
        Self { embedder, chat }
    }

    /// Runs all strategies. The two network-bound ones run concurrently; they
    /// share nothing mutable and fill disjoint slots of the card.
    pub async fn score(&self, resume_text: &str, job_text: &str, skills: &[String]) -> ScoreCard {
        let lexical = lexical::tfidf_similarity(resume_text, job_text);

        let (embedding, assessment) = tokio::join!(
            embedding::embedding_similarity(self.embedder.as_ref(), resume_text, job_text),
            assessment::assess(self.chat.as_ref(), resume_text, job_text, skills),
        );

        if let Err(e) = &lexical {
            warn!(strategy = "lexical", error = %e, "Scoring strategy failed");
        }
        if let Err(e) = &embedding {
            warn!(strategy = "embedding", error = %e, "Scoring strategy failed");
        }
        if let Err(e) = &assessment {
            warn!(strategy = "assessment", error = %e, "Scoring strategy failed");
        }

        ScoreCard {
            lexical,
            embedding,
            assessment,
        }
    }
}

#[cfg(test)]
pub(crate) mod stubs {
    //! Provider stand-ins shared by the scoring and pipeline tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{ChatProvider, EmbeddingProvider};
    use crate::llm_client::LlmError;

    /// Counts calls; returns a fixed vector or a provider error.
    #[derive(Default)]
    pub struct StubEmbedder {
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl StubEmbedder {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::Api {
                    status: 503,
                    message: "embedding service unavailable".to_string(),
                });
            }
            // Cheap deterministic "embedding": length and vowel count.
            let vowels = text.chars().filter(|c| "aeiouAEIOU".contains(*c)).count();
            Ok(vec![1.0, text.len() as f32, vowels as f32])
        }
    }

    /// Counts calls; returns a canned assessment or a provider error.
    #[derive(Default)]
    pub struct StubChat {
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    pub const STUB_ASSESSMENT: &str =
        r#"{"score": 8, "justification": ["Go and Kubernetes match"], "matched_skills": ["Go", "Kubernetes"]}"#;

    impl StubChat {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for StubChat {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::Api {
                    status: 401,
                    message: "invalid x-api-key".to_string(),
                });
            }
            Ok(STUB_ASSESSMENT.to_string())
        }
    }
}

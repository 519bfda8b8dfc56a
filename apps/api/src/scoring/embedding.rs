//! Embedding similarity: cosine of two provider-issued embedding vectors.

use async_trait::async_trait;

use super::ScoringError;
use crate::llm_client::{EmbeddingClient, LlmError};

/// Anything that can turn text into a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        EmbeddingClient::embed(self, text).await
    }
}

/// Embeds both texts and returns their cosine similarity in `[-1, 1]`.
pub async fn embedding_similarity(
    provider: &dyn EmbeddingProvider,
    a: &str,
    b: &str,
) -> Result<f64, ScoringError> {
    let vec_a = provider.embed(a).await?;
    let vec_b = provider.embed(b).await?;
    cosine_similarity(&vec_a, &vec_b)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, ScoringError> {
    if a.len() != b.len() {
        return Err(ScoringError::DimensionMismatch(a.len(), b.len()));
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Err(ScoringError::ZeroVector);
    }
    let similarity = dot / denom;
    if !similarity.is_finite() {
        return Err(ScoringError::NonFinite);
    }
    Ok(similarity.clamp(-1.0, 1.0))
}

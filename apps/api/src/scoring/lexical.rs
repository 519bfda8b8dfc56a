//! Lexical similarity: TF-IDF vectors over the pair's combined vocabulary,
//! compared with cosine similarity. Pure, local, no I/O.

use std::collections::{BTreeMap, BTreeSet};

use super::ScoringError;

/// Lowercased runs of word characters, keeping only tokens of two or more
/// characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn term_counts(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine similarity of the two texts' TF-IDF vectors, in `[0, 1]`.
///
/// idf uses the smoothed form `ln((1 + n) / (1 + df)) + 1` with `n = 2`.
/// A text with no tokens contributes a zero vector and scores `0.0`; when
/// neither text has a token the vocabulary is empty and the call fails.
pub fn tfidf_similarity(a: &str, b: &str) -> Result<f64, ScoringError> {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    let counts_a = term_counts(&tokens_a);
    let counts_b = term_counts(&tokens_b);

    let vocabulary: BTreeSet<&str> = counts_a.keys().chain(counts_b.keys()).copied().collect();
    if vocabulary.is_empty() {
        return Err(ScoringError::EmptyVocabulary);
    }

    let n_docs = 2.0_f64;
    let mut vec_a = Vec::with_capacity(vocabulary.len());
    let mut vec_b = Vec::with_capacity(vocabulary.len());
    for term in &vocabulary {
        let tf_a = counts_a.get(term).copied().unwrap_or(0.0);
        let tf_b = counts_b.get(term).copied().unwrap_or(0.0);
        let df = (tf_a > 0.0) as u8 as f64 + (tf_b > 0.0) as u8 as f64;
        let idf = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
        vec_a.push(tf_a * idf);
        vec_b.push(tf_b * idf);
    }

    let norm_a = l2_norm(&vec_a);
    let norm_b = l2_norm(&vec_b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let dot: f64 = vec_a.iter().zip(&vec_b).map(|(x, y)| x * y).sum();
    let similarity = dot / (norm_a * norm_b);
    if !similarity.is_finite() {
        return Err(ScoringError::NonFinite);
    }
    Ok(similarity.clamp(0.0, 1.0))
}

fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

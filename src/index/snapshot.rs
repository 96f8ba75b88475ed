use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::Chunk;

/// One indexed chunk with the embedding computed at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// The frozen result of one index build: all entries in build order plus the
/// provenance needed to detect an embedding-model mismatch. Snapshots are
/// immutable; a rebuild produces a new snapshot rather than mutating one.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub model_id: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
    pub entries: Vec<IndexEntry>,
}

impl IndexSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank every entry against the query vector and keep the top `k`.
    /// The ordering is total: score descending, then chunk id ascending, so
    /// equal scores replay identically.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        scored.truncate(k);
        scored
    }
}

/// Cosine similarity clamped into [-1, 1]. Mismatched or degenerate inputs
/// score 0 rather than erroring; the dimension precondition is enforced
/// upstream by the model-id check.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::errors::CopilotError;

/// Embedding provider seam.
///
/// Implementations must be deterministic for a given `model_id`: the same
/// text always maps to the same vector, or a persisted index could not be
/// replayed. Swapping providers invalidates existing indexes, which the
/// store detects through the stored model id.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier written into index provenance and checked on load.
    fn model_id(&self) -> &str;

    /// Fixed output dimension.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CopilotError>;
}

/// Self-contained default provider: signed feature hashing over lowercased
/// alphanumeric tokens, L2-normalized. SHA-256 keeps bucket assignment
/// stable across platforms and releases, which the persistence contract
/// requires.
pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            model_id: format!("{}/{}", config.model_id, config.dimension),
            dimension: config.dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let (bucket, sign) = token_bucket(&token, self.dimension);
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CopilotError> {
        Ok(inputs.iter().map(|text| self.embed_one(text)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

fn token_bucket(token: &str, dimension: usize) -> (usize, f32) {
    let digest = Sha256::digest(token.as_bytes());
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest[..8]);
    let hash = u64::from_le_bytes(raw);

    let bucket = (hash % dimension as u64) as usize;
    let sign = if hash & (1u64 << 63) == 0 { 1.0 } else { -1.0 };
    (bucket, sign)
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

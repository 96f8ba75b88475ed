use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::errors::CopilotError;
use crate::index::{ScoredChunk, VectorIndex};

/// Embeds a query with the index's provider and ranks it against the current
/// snapshot. Stateless per call: everything derives from the query text and
/// the snapshot in hand.
pub struct Retriever {
    index: Arc<VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, config: RetrievalConfig) -> Self {
        Self { index, config }
    }

    pub fn default_k(&self) -> usize {
        self.config.top_k
    }

    /// Retrieve the top `k` chunks for `query` (configured default when
    /// `None`). Embedding and similarity search share one per-request
    /// budget; exceeding it surfaces `RetrievalTimeout` rather than partial
    /// results.
    pub async fn retrieve(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<ScoredChunk>, CopilotError> {
        let snapshot = self.index.snapshot()?;
        let embedder = Arc::clone(self.index.embedder());

        // The snapshot records which provider built it; a different provider
        // here would produce vectors in an unrelated space.
        if snapshot.model_id != embedder.model_id() {
            return Err(CopilotError::EmbeddingVersionMismatch {
                expected: snapshot.model_id.clone(),
                found: embedder.model_id().to_string(),
            });
        }

        let k = k.unwrap_or(self.config.top_k);
        let budget = Duration::from_millis(self.config.timeout_ms);
        let query_text = query.to_string();

        let ranked = tokio::time::timeout(budget, async move {
            let vectors = embedder.embed(std::slice::from_ref(&query_text)).await?;
            let Some(query_vector) = vectors.first() else {
                return Err(CopilotError::InvalidInput(
                    "embedder returned no vector for the query".to_string(),
                ));
            };
            Ok(snapshot.search(query_vector, k))
        })
        .await
        .map_err(|_| CopilotError::RetrievalTimeout {
            timeout_ms: self.config.timeout_ms,
        })??;

        tracing::debug!(results = ranked.len(), k, "retrieval complete");
        Ok(ranked)
    }
}

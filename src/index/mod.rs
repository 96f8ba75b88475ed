//! Embedding index: provider seam, immutable snapshots, SQLite persistence,
//! and the shared handle that swaps snapshots atomically.

mod embedder;
mod snapshot;
mod store;

pub use embedder::{Embedder, HashingEmbedder};
pub use snapshot::{IndexEntry, IndexSnapshot, ScoredChunk};
pub use store::IndexStore;

use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::Serialize;

use crate::errors::CopilotError;
use crate::ingest::Chunk;

/// Liveness view of the index, consumed by the external API layer's probe.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub loaded: bool,
    pub chunk_count: usize,
    pub model_id: Option<String>,
    pub built_at: Option<String>,
}

/// Shared handle over the current snapshot.
///
/// Readers clone the `Arc` out of the slot and run against that frozen
/// snapshot; build and load replace the slot in a single pointer swap, so
/// in-flight queries never observe a half-updated index. The lock is only
/// ever held for the swap itself, never across an await point.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    store: IndexStore,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: IndexStore) -> Self {
        Self {
            embedder,
            store,
            current: RwLock::new(None),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed all chunks, persist the result, then swap it in. Nothing is
    /// swapped, and nothing partial persisted, if any step fails.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<Arc<IndexSnapshot>, CopilotError> {
        if chunks.is_empty() {
            return Err(CopilotError::InvalidInput("no chunks to index".to_string()));
        }

        tracing::info!(
            chunks = chunks.len(),
            model = self.embedder.model_id(),
            "building index"
        );

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(CopilotError::Storage(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let snapshot = Arc::new(IndexSnapshot {
            model_id: self.embedder.model_id().to_string(),
            dimension: self.embedder.dimension(),
            built_at: Utc::now(),
            entries,
        });

        self.store.save(&snapshot).await?;
        self.swap(Arc::clone(&snapshot));

        Ok(snapshot)
    }

    /// Load the persisted snapshot and swap it in. Fails with
    /// `EmbeddingVersionMismatch` when it was built by a different provider.
    pub async fn load(&self) -> Result<Arc<IndexSnapshot>, CopilotError> {
        let snapshot = Arc::new(self.store.load(self.embedder.model_id()).await?);
        self.swap(Arc::clone(&snapshot));
        tracing::info!(chunks = snapshot.len(), "index loaded from disk");
        Ok(snapshot)
    }

    /// The current snapshot, or `IndexUnavailable` before any build/load.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>, CopilotError> {
        self.read_slot().ok_or(CopilotError::IndexUnavailable)
    }

    pub fn status(&self) -> IndexStatus {
        match self.read_slot() {
            Some(snapshot) => IndexStatus {
                loaded: true,
                chunk_count: snapshot.len(),
                model_id: Some(snapshot.model_id.clone()),
                built_at: Some(snapshot.built_at.to_rfc3339()),
            },
            None => IndexStatus {
                loaded: false,
                chunk_count: 0,
                model_id: None,
                built_at: None,
            },
        }
    }

    fn read_slot(&self) -> Option<Arc<IndexSnapshot>> {
        match self.current.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn swap(&self, snapshot: Arc<IndexSnapshot>) {
        match self.current.write() {
            Ok(mut slot) => *slot = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("id-{text}"),
            title: "Manual".to_string(),
            page: 1,
            text: text.to_string(),
            char_len: text.chars().count(),
        }
    }

    async fn test_index() -> VectorIndex {
        let db = std::env::temp_dir().join(format!("copilot-vindex-test-{}.db", uuid::Uuid::new_v4()));
        let store = IndexStore::open(db).await.unwrap();
        let embedder = Arc::new(HashingEmbedder::new(&EmbeddingConfig {
            model_id: "hash-bow-v1".to_string(),
            dimension: 32,
        }));
        VectorIndex::new(embedder, store)
    }

    #[tokio::test]
    async fn query_before_build_is_index_unavailable() {
        let index = test_index().await;
        assert!(matches!(index.snapshot(), Err(CopilotError::IndexUnavailable)));
        assert!(!index.status().loaded);
    }

    #[tokio::test]
    async fn build_makes_snapshot_available_and_status_loaded() {
        let index = test_index().await;
        index
            .build(vec![chunk("temperature limits"), chunk("valve maintenance")])
            .await
            .unwrap();

        let snapshot = index.snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);

        let status = index.status();
        assert!(status.loaded);
        assert_eq!(status.chunk_count, 2);
        assert_eq!(status.model_id.as_deref(), Some("hash-bow-v1/32"));
    }

    #[tokio::test]
    async fn building_empty_chunk_set_is_rejected() {
        let index = test_index().await;
        assert!(matches!(
            index.build(Vec::new()).await,
            Err(CopilotError::InvalidInput(_))
        ));
        assert!(matches!(index.snapshot(), Err(CopilotError::IndexUnavailable)));
    }

    #[tokio::test]
    async fn rebuild_replaces_snapshot_for_new_readers() {
        let index = test_index().await;
        index.build(vec![chunk("first build")]).await.unwrap();
        let old = index.snapshot().unwrap();

        index
            .build(vec![chunk("second build"), chunk("more content")])
            .await
            .unwrap();

        // The old Arc stays valid for in-flight readers; new readers see the
        // replacement.
        assert_eq!(old.len(), 1);
        assert_eq!(index.snapshot().unwrap().len(), 2);
    }
}

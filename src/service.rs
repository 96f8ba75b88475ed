use std::sync::Arc;

use crate::alarms::{AlarmSource, TimeWindow};
use crate::config::AppConfig;
use crate::errors::CopilotError;
use crate::fusion::AlarmExplainer;
use crate::index::{Embedder, IndexStatus, IndexStore, VectorIndex};
use crate::ingest::{Chunker, Document};
use crate::retrieval::{
    Answer, AnswerComposer, AnswerGenerator, ConfidenceGate, QaPipeline, Retriever,
    TemplateGenerator,
};

/// Facade over the whole pipeline; the surface the external API layer talks
/// to. Serving methods are stateless over the current index snapshot and
/// safe for concurrent use; only build/load mutate shared state, via one
/// atomic snapshot swap.
pub struct Copilot {
    index: Arc<VectorIndex>,
    chunker: Chunker,
    pipeline: Arc<QaPipeline>,
    explainer: AlarmExplainer,
}

impl Copilot {
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        store: IndexStore,
        alarm_source: Arc<dyn AlarmSource>,
    ) -> Self {
        Self::with_generator(config, embedder, store, alarm_source, Arc::new(TemplateGenerator))
    }

    /// Same wiring with a caller-supplied generator behind the composer
    /// seam.
    pub fn with_generator(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        store: IndexStore,
        alarm_source: Arc<dyn AlarmSource>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let index = Arc::new(VectorIndex::new(embedder, store));
        let retriever = Retriever::new(Arc::clone(&index), config.retrieval.clone());
        let gate = ConfidenceGate::new(config.retrieval.score_threshold);
        let composer = AnswerComposer::new(generator);
        let pipeline = Arc::new(QaPipeline::new(retriever, gate, composer));
        let explainer = AlarmExplainer::new(alarm_source, Arc::clone(&pipeline));

        Self {
            index,
            chunker: Chunker::new(config.chunking.clone()),
            pipeline,
            explainer,
        }
    }

    /// Chunk the documents and rebuild the index from scratch: embeddings
    /// are regenerated, the snapshot persisted, then swapped in atomically.
    /// Returns the number of indexed chunks.
    pub async fn build_index(&self, documents: &[Document]) -> Result<usize, CopilotError> {
        let mut chunks = Vec::new();
        for document in documents {
            chunks.extend(self.chunker.chunk_document(document));
        }
        let snapshot = self.index.build(chunks).await?;
        Ok(snapshot.len())
    }

    /// Load a previously persisted index. Returns the number of chunks.
    pub async fn load_index(&self) -> Result<usize, CopilotError> {
        let snapshot = self.index.load().await?;
        Ok(snapshot.len())
    }

    /// Answer a free-text question from the corpus. Weak evidence yields the
    /// fixed insufficient-evidence Answer, not an error.
    pub async fn ask(&self, query: &str) -> Result<Answer, CopilotError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CopilotError::InvalidInput("empty query".to_string()));
        }

        tracing::info!(query, "processing question");
        self.pipeline.answer(query).await
    }

    /// Explain an alarm window for one tag: quantitative summary fused with
    /// procedural guidance. Timestamps are ISO-8601, end exclusive.
    pub async fn explain_alarm(
        &self,
        tag: &str,
        start: &str,
        end: &str,
    ) -> Result<Answer, CopilotError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(CopilotError::InvalidInput("empty tag".to_string()));
        }

        let window = TimeWindow::parse(start, end)?;
        tracing::info!(%tag, start, end, "explaining alarm window");
        self.explainer.explain(tag, window).await
    }

    /// Liveness probe for the external API layer.
    pub fn status(&self) -> IndexStatus {
        self.index.status()
    }
}

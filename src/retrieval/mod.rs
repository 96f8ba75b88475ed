//! Query-time pipeline: retrieve, gate, compose.

mod composer;
mod gate;
mod retriever;

pub use composer::{
    Answer, AnswerComposer, AnswerGenerator, Citation, TemplateGenerator,
    INSUFFICIENT_EVIDENCE_ANSWER,
};
pub use gate::{ConfidenceGate, GateDecision};
pub use retriever::Retriever;

use crate::errors::CopilotError;

/// The full grounded-answer path, shared by the question interface and the
/// alarm fusion layer. Rejected evidence still produces an Answer (the fixed
/// fallback); only infrastructure failures surface as errors.
pub struct QaPipeline {
    retriever: Retriever,
    gate: ConfidenceGate,
    composer: AnswerComposer,
}

impl QaPipeline {
    pub fn new(retriever: Retriever, gate: ConfidenceGate, composer: AnswerComposer) -> Self {
        Self {
            retriever,
            gate,
            composer,
        }
    }

    pub async fn answer(&self, query: &str) -> Result<Answer, CopilotError> {
        let ranked = self.retriever.retrieve(query, None).await?;
        let decision = self.gate.gate(ranked);
        self.composer.compose(query, decision).await
    }
}

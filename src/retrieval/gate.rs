use crate::index::ScoredChunk;

/// Outcome of confidence gating over ranked retrieval results.
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// Evidence at or above the threshold, rank order preserved.
    Pass(Vec<ScoredChunk>),
    /// Nothing retrieved, or the best score fell below the threshold.
    Reject { best_score: Option<f32> },
}

impl GateDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateDecision::Pass(_))
    }
}

/// Score-threshold policy deciding whether retrieved evidence is strong
/// enough to answer from. One scalar, no per-query adaptation; a score
/// exactly at the threshold passes.
///
/// This is the guard against fabricated answers, so it is kept free of any
/// composer concerns and testable on bare ranked lists.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceGate {
    threshold: f32,
}

impl ConfidenceGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn gate(&self, ranked: Vec<ScoredChunk>) -> GateDecision {
        let Some(best) = ranked.first() else {
            return GateDecision::Reject { best_score: None };
        };

        if best.score < self.threshold {
            tracing::info!(
                best = best.score,
                threshold = self.threshold,
                "best score below threshold, rejecting evidence"
            );
            return GateDecision::Reject {
                best_score: Some(best.score),
            };
        }

        let evidence: Vec<ScoredChunk> = ranked
            .into_iter()
            .filter(|result| result.score >= self.threshold)
            .collect();

        GateDecision::Pass(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Chunk;

    fn scored(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                chunk_id: id.to_string(),
                title: "Manual".to_string(),
                page: 1,
                text: format!("text {id}"),
                char_len: 7,
            },
            score,
        }
    }

    #[test]
    fn empty_results_reject() {
        let decision = ConfidenceGate::new(0.35).gate(Vec::new());
        assert!(matches!(decision, GateDecision::Reject { best_score: None }));
    }

    #[test]
    fn best_below_threshold_rejects() {
        let decision = ConfidenceGate::new(0.35).gate(vec![scored("a", 0.10)]);
        match decision {
            GateDecision::Reject { best_score } => assert_eq!(best_score, Some(0.10)),
            GateDecision::Pass(_) => panic!("should reject"),
        }
    }

    #[test]
    fn score_exactly_at_threshold_passes() {
        let decision = ConfidenceGate::new(0.35).gate(vec![scored("a", 0.35)]);
        match decision {
            GateDecision::Pass(evidence) => assert_eq!(evidence.len(), 1),
            GateDecision::Reject { .. } => panic!("threshold score must pass"),
        }
    }

    #[test]
    fn sub_threshold_results_never_enter_evidence() {
        let ranked = vec![scored("a", 0.81), scored("b", 0.40), scored("c", 0.20)];
        let decision = ConfidenceGate::new(0.35).gate(ranked);

        match decision {
            GateDecision::Pass(evidence) => {
                let ids: Vec<&str> = evidence.iter().map(|e| e.chunk.chunk_id.as_str()).collect();
                assert_eq!(ids, vec!["a", "b"]);
            }
            GateDecision::Reject { .. } => panic!("should pass"),
        }
    }

    #[test]
    fn pass_preserves_rank_order() {
        let ranked = vec![scored("first", 0.9), scored("second", 0.7), scored("third", 0.5)];
        let GateDecision::Pass(evidence) = ConfidenceGate::new(0.35).gate(ranked) else {
            panic!("should pass");
        };

        let scores: Vec<f32> = evidence.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.5]);
    }
}

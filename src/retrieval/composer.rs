use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::CopilotError;
use crate::index::ScoredChunk;

use super::gate::GateDecision;

/// Fixed response used whenever the gate rejects. Never varied by query.
pub const INSUFFICIENT_EVIDENCE_ANSWER: &str = "I don't know the answer to that question based \
    on the available documents. Try rephrasing it, or ask about topics the technical manuals \
    cover.";

/// Pointer to supporting evidence: provenance and score, not the chunk text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub page: u32,
    pub score: f32,
}

/// A grounded response. `summary_from_data` is populated only by the alarm
/// fusion path. Request-scoped; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_from_data: Option<String>,
}

/// Text-assembly seam: a pure capability from (query, evidence) to answer
/// text. The default is the deterministic template below; a generative model
/// can be substituted here without touching gating or citation assembly.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, query: &str, evidence: &[ScoredChunk]) -> Result<String, CopilotError>;
}

/// Deterministic template generation: query-aware extraction from the top
/// passage, no inference, no randomness. Same query and evidence always
/// produce the same text.
pub struct TemplateGenerator;

#[async_trait]
impl AnswerGenerator for TemplateGenerator {
    async fn generate(&self, query: &str, evidence: &[ScoredChunk]) -> Result<String, CopilotError> {
        let Some(top) = evidence.first() else {
            return Err(CopilotError::InvalidInput(
                "no evidence to compose an answer from".to_string(),
            ));
        };

        let query_lower = query.to_lowercase();

        if query_lower.contains("range") {
            if let Some(extract) = labeled_range_clause(&top.chunk.text) {
                return Ok(extract);
            }
        }

        if query_lower.contains("procedure")
            || query_lower.contains("alarm")
            || query_lower.contains("steps")
        {
            let steps = procedure_steps(&top.chunk.text);
            if !steps.is_empty() {
                return Ok(format!("{}.", steps.join(". ")));
            }
        }

        Ok(leading_sentences(&top.chunk.text, 2))
    }
}

/// Pull a labeled range clause ("Normal Operating Range: 20 to 80 C") out of
/// a passage and restate it as a sentence.
fn labeled_range_clause(text: &str) -> Option<String> {
    static RANGE_RE: OnceLock<Regex> = OnceLock::new();
    let re = RANGE_RE.get_or_init(|| {
        Regex::new(r"(?i)([a-z][a-z /_-]*range)\s*:\s*([^.;:]+)").expect("range pattern is valid")
    });

    let captures = re.captures(text)?;
    let label = captures.get(1)?.as_str().trim().to_lowercase();
    let value = captures.get(2)?.as_str().trim();
    if value.is_empty() {
        return None;
    }
    Some(format!("The {label} is {value}."))
}

/// Step-like sentences: numbered items or imperative maintenance verbs, the
/// shape procedures take in the manuals.
fn procedure_steps(text: &str) -> Vec<String> {
    const STEP_VERBS: [&str; 6] = ["check", "verify", "reduce", "isolate", "notify", "confirm"];

    text.split('.')
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > 10 && sentence.chars().count() < 200)
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            sentence.chars().next().is_some_and(|c| c.is_ascii_digit())
                || STEP_VERBS.iter().any(|verb| lower.contains(verb))
        })
        .take(3)
        .map(str::to_string)
        .collect()
}

fn leading_sentences(text: &str, count: usize) -> String {
    let sentences: Vec<&str> = text
        .split('.')
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > 20)
        .take(count)
        .collect();

    if sentences.is_empty() {
        return text.chars().take(300).collect();
    }
    format!("{}.", sentences.join(". "))
}

/// Assembles the final Answer: fixed fallback on Reject, generated text plus
/// one citation per evidence chunk on Pass. Citations keep the evidence
/// order, which the gate guarantees is descending by score.
pub struct AnswerComposer {
    generator: Arc<dyn AnswerGenerator>,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn AnswerGenerator>) -> Self {
        Self { generator }
    }

    pub async fn compose(
        &self,
        query: &str,
        decision: GateDecision,
    ) -> Result<Answer, CopilotError> {
        let evidence = match decision {
            GateDecision::Reject { .. } => {
                return Ok(Answer {
                    answer: INSUFFICIENT_EVIDENCE_ANSWER.to_string(),
                    citations: Vec::new(),
                    summary_from_data: None,
                });
            }
            GateDecision::Pass(evidence) => evidence,
        };

        let text = self.generator.generate(query, &evidence).await?;
        let citations = evidence
            .iter()
            .map(|result| Citation {
                title: result.chunk.title.clone(),
                page: result.chunk.page,
                score: result.score,
            })
            .collect();

        Ok(Answer {
            answer: text,
            citations,
            summary_from_data: None,
        })
    }
}

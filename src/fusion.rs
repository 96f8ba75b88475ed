use std::sync::Arc;

use crate::alarms::{AlarmAnalyzer, AlarmSource, AlarmState, DataSummary, TimeWindow, TrendDirection};
use crate::errors::CopilotError;
use crate::retrieval::{Answer, QaPipeline};

/// Fuses the quantitative alarm summary with procedural guidance retrieved
/// from the document corpus: one Answer carrying both.
pub struct AlarmExplainer {
    source: Arc<dyn AlarmSource>,
    pipeline: Arc<QaPipeline>,
}

impl AlarmExplainer {
    pub fn new(source: Arc<dyn AlarmSource>, pipeline: Arc<QaPipeline>) -> Self {
        Self { source, pipeline }
    }

    /// Analyze the window, then retrieve guidance for what the data shows.
    /// A window with no data still gets a document-only attempt from the tag
    /// name, and the summary states the absence explicitly.
    pub async fn explain(&self, tag: &str, window: TimeWindow) -> Result<Answer, CopilotError> {
        match AlarmAnalyzer.analyze(self.source.as_ref(), tag, window).await {
            Ok(summary) => {
                let query = guidance_query(tag, &summary);
                tracing::info!(%tag, %query, "fusing data summary with document guidance");

                let mut answer = self.pipeline.answer(&query).await?;
                answer.summary_from_data = Some(summary.render());
                Ok(answer)
            }
            Err(CopilotError::NoDataInWindow { .. }) => {
                tracing::warn!(%tag, "no data in window, falling back to document-only guidance");

                let mut answer = self.pipeline.answer(tag).await?;
                answer.summary_from_data =
                    Some(format!("No data found for {tag} in the requested window."));
                Ok(answer)
            }
            Err(err) => Err(err),
        }
    }
}

/// Build the retrieval query from what the analyzer saw: the tag itself,
/// the most severe alarm state present, and the trend.
fn guidance_query(tag: &str, summary: &DataSummary) -> String {
    let mut parts = vec![tag.to_string()];

    if summary.state_counts.contains_key(&AlarmState::HighHigh) {
        parts.push("high high alarm response procedure".to_string());
    } else if summary.state_counts.contains_key(&AlarmState::High) {
        parts.push("high alarm response procedure".to_string());
    } else if summary.state_counts.contains_key(&AlarmState::Low) {
        parts.push("low alarm response procedure".to_string());
    }

    match summary.trend {
        TrendDirection::Increasing => parts.push("rising trend troubleshooting".to_string()),
        TrendDirection::Decreasing => parts.push("falling trend troubleshooting".to_string()),
        TrendDirection::Stable => {}
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::AlarmRecord;
    use crate::config::RetrievalConfig;
    use crate::errors::CopilotError;
    use crate::index::{Embedder, IndexStore, VectorIndex};
    use crate::ingest::Chunk;
    use crate::retrieval::{
        AnswerComposer, ConfidenceGate, Retriever, TemplateGenerator, INSUFFICIENT_EVIDENCE_ANSWER,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    /// Keyword projection embedder: transparent scores for pipeline tests.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_id(&self) -> &str {
            "keyword-test/3"
        }

        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CopilotError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    let mut v = vec![0.0f32; 3];
                    if lower.contains("temp") {
                        v[0] = 1.0;
                    }
                    if lower.contains("alarm") || lower.contains("procedure") {
                        v[1] = 1.0;
                    }
                    if lower.contains("pressure") {
                        v[2] = 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    struct VecSource(Vec<AlarmRecord>);

    #[async_trait]
    impl AlarmSource for VecSource {
        async fn load(&self) -> Result<Vec<AlarmRecord>, CopilotError> {
            Ok(self.0.clone())
        }
    }

    fn chunk(title: &str, page: u32, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("{title}-p{page}"),
            title: title.to_string(),
            page,
            text: text.to_string(),
            char_len: text.chars().count(),
        }
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 20, 15, 30, 0).unwrap() + Duration::minutes(minute)
    }

    async fn pipeline_over_corpus() -> Arc<QaPipeline> {
        let db = std::env::temp_dir().join(format!("copilot-fusion-test-{}.db", uuid::Uuid::new_v4()));
        let store = IndexStore::open(db).await.unwrap();
        let index = Arc::new(VectorIndex::new(Arc::new(KeywordEmbedder), store));
        index
            .build(vec![
                chunk(
                    "Alarm_Response",
                    7,
                    "Temp alarm response procedure. 1: Check coolant flow on loop A. \
                     2: Verify the temp setpoint against the curve.",
                ),
                chunk("Warehouse_Notes", 2, "Gasket stock is counted monthly."),
            ])
            .await
            .unwrap();

        let retriever = Retriever::new(
            index,
            RetrievalConfig {
                top_k: 5,
                score_threshold: 0.35,
                timeout_ms: 5_000,
            },
        );
        Arc::new(QaPipeline::new(
            retriever,
            ConfidenceGate::new(0.35),
            AnswerComposer::new(Arc::new(TemplateGenerator)),
        ))
    }

    #[tokio::test]
    async fn rising_alarm_window_yields_fused_answer_with_citation() {
        let records: Vec<AlarmRecord> = (0..60)
            .map(|minute| AlarmRecord {
                timestamp: at(minute),
                tag: "Temp_101".to_string(),
                value: 70.0 + minute as f64,
                alarm_state: if minute < 40 {
                    AlarmState::Ok
                } else {
                    AlarmState::High
                },
            })
            .collect();

        let explainer = AlarmExplainer::new(
            Arc::new(VecSource(records)),
            pipeline_over_corpus().await,
        );
        let window = TimeWindow::new(at(0), at(60)).unwrap();

        let answer = explainer.explain("Temp_101", window).await.unwrap();

        let summary = answer.summary_from_data.as_deref().unwrap();
        assert!(summary.contains("60 over 1.0 hours"));
        assert!(summary.contains("increasing"));
        assert!(!answer.citations.is_empty());
        assert_eq!(answer.citations[0].title, "Alarm_Response");
        assert_eq!(answer.citations[0].page, 7);
    }

    #[tokio::test]
    async fn empty_window_states_no_data_but_still_retrieves() {
        let explainer = AlarmExplainer::new(
            Arc::new(VecSource(Vec::new())),
            pipeline_over_corpus().await,
        );
        let window = TimeWindow::new(at(0), at(60)).unwrap();

        let answer = explainer.explain("Temp_101", window).await.unwrap();

        let summary = answer.summary_from_data.as_deref().unwrap();
        assert!(summary.contains("No data found for Temp_101"));
        // The tag name alone still hits the temp-related passage.
        assert!(!answer.citations.is_empty());
        assert_eq!(answer.citations[0].title, "Alarm_Response");
    }

    #[tokio::test]
    async fn unrelated_tag_with_no_data_still_returns_fixed_answer() {
        let explainer = AlarmExplainer::new(
            Arc::new(VecSource(Vec::new())),
            pipeline_over_corpus().await,
        );
        let window = TimeWindow::new(at(0), at(60)).unwrap();

        let answer = explainer.explain("Flow_909", window).await.unwrap();

        assert_eq!(answer.answer, INSUFFICIENT_EVIDENCE_ANSWER);
        assert!(answer.citations.is_empty());
        assert!(answer
            .summary_from_data
            .as_deref()
            .unwrap()
            .contains("No data found"));
    }

    #[test]
    fn query_synthesis_reflects_severity_and_trend() {
        let mut state_counts = std::collections::BTreeMap::new();
        state_counts.insert(AlarmState::Ok, 40);
        state_counts.insert(AlarmState::HighHigh, 5);

        let summary = DataSummary {
            tag: "Temp_101".to_string(),
            count: 45,
            window_hours: 1.0,
            min_value: 70.0,
            max_value: 95.0,
            mean_value: 80.0,
            std_value: 5.0,
            trend_slope: 0.6,
            trend: TrendDirection::Increasing,
            state_counts,
            transitions: Vec::new(),
        };

        assert_eq!(
            guidance_query("Temp_101", &summary),
            "Temp_101 high high alarm response procedure rising trend troubleshooting"
        );
    }
}

use axum::{extract::State, Json};
use joblab_agent::CvMatchResult;
use joblab_core::errors::ApplicationError;
use joblab_core::matching::MatchFilters;
use serde::Deserialize;
use tracing::info;

use crate::api::{new_correlation_id, reject, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MatchCvRequest {
    pub cv_text: String,
    pub countries: Vec<String>,
    pub job_levels: Vec<String>,
    pub job_functions: Vec<String>,
    pub platforms: Vec<String>,
    pub is_remote: Option<bool>,
    pub role_keyword: String,
}

impl MatchCvRequest {
    fn filters(&self) -> MatchFilters {
        let keyword = self.role_keyword.trim();
        MatchFilters {
            countries: self.countries.clone(),
            job_levels: self.job_levels.clone(),
            job_functions: self.job_functions.clone(),
            platforms: self.platforms.clone(),
            is_remote: self.is_remote,
            role_keyword: (!keyword.is_empty()).then(|| keyword.to_owned()),
        }
    }
}

pub async fn match_cv(
    State(state): State<AppState>,
    Json(body): Json<MatchCvRequest>,
) -> ApiResult<CvMatchResult> {
    let correlation_id = new_correlation_id();
    let Some(matcher) = state.matcher.as_ref() else {
        let error =
            ApplicationError::Configuration("embedding service is not configured".to_owned());
        return Err(reject(error, &correlation_id));
    };

    let filters = body.filters();
    info!(
        event_name = "api.match_cv.received",
        correlation_id = %correlation_id,
        cv_chars = body.cv_text.chars().count(),
        filtered = filters.is_active(),
        "cv match request received"
    );

    let result = matcher
        .match_cv(&body.cv_text, &filters)
        .await
        .map_err(|error| reject(ApplicationError::from(error), &correlation_id))?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use chrono::{Duration, Utc};
    use joblab_agent::embeddings::{Embedder, EmbeddingError};
    use joblab_agent::llm::{CompletionClient, CompletionReply, CompletionRequest, LlmError};
    use joblab_agent::{
        AgentRuntime, CvMatcher, DialoguePolicy, InMemoryConversationMemory, ToolRouter,
    };
    use joblab_core::config::MatchingConfig;
    use joblab_core::matching::ScoredChunk;
    use joblab_db::repositories::InMemoryCvRepository;
    use joblab_db::{InMemoryJobStore, PageSpec};
    use serde_json::json;

    use super::{match_cv, MatchCvRequest};
    use crate::api::AppState;

    struct Silent(Mutex<VecDeque<CompletionReply>>);

    #[async_trait]
    impl CompletionClient for Silent {
        fn model(&self) -> &str {
            "unused"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionReply, LlmError> {
            self.0.lock().expect("lock").pop_front().ok_or(LlmError::MissingApiKey)
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.25; 8])
        }
    }

    async fn state(with_matcher: bool) -> AppState {
        let recent = (Utc::now().date_naive() - Duration::days(2)).format("%Y-%m-%d").to_string();
        let store = Arc::new(InMemoryJobStore::default());
        store
            .insert_rows((0..3).map(|id| {
                let country = if id == 0 { "Sweden" } else { "Germany" };
                json!({
                    "job_id": format!("j{id}"),
                    "actual_role": "Rust Engineer",
                    "company_name": "Acme",
                    "country": country,
                    "posted_date": recent,
                    "is_remote": id == 0
                })
                .as_object()
                .cloned()
                .unwrap_or_default()
            }))
            .await;
        store
            .insert_chunks((0..3).map(|id| ScoredChunk {
                job_id: format!("j{id}"),
                similarity: 0.8 - id as f64 * 0.1,
            }))
            .await;

        let runtime = AgentRuntime::new(
            Arc::new(Silent(Mutex::new(VecDeque::new()))),
            ToolRouter::new(store.clone(), PageSpec::default()),
            Arc::new(InMemoryConversationMemory::new(10, std::time::Duration::from_secs(60))),
            DialoguePolicy::default(),
        );
        let matcher = with_matcher.then(|| {
            Arc::new(CvMatcher::new(
                Arc::new(FixedEmbedder),
                store,
                Arc::new(InMemoryCvRepository::default()),
                &MatchingConfig {
                    target_total: 10,
                    min_strict: 5,
                    recency_days: 30,
                    candidate_pool: 50,
                },
            ))
        });
        AppState { runtime: Arc::new(runtime), matcher }
    }

    #[tokio::test]
    async fn matches_are_ranked_and_flagged() {
        let request = MatchCvRequest {
            cv_text: "Rust engineer, five years of backend work".into(),
            is_remote: Some(true),
            ..MatchCvRequest::default()
        };

        let Json(result) =
            match_cv(State(state(true).await), Json(request)).await.expect("matches");

        let flags: Vec<(&str, bool)> =
            result.matches.iter().map(|job| (job.job_id.as_str(), job.relaxed_criteria)).collect();
        assert_eq!(flags, [("j0", false), ("j1", true), ("j2", true)]);
        assert!(!result.cv_id.is_empty());
    }

    #[tokio::test]
    async fn short_cv_is_a_bad_request() {
        let request = MatchCvRequest { cv_text: "tiny".into(), ..MatchCvRequest::default() };

        let (status, _) =
            match_cv(State(state(true).await), Json(request)).await.expect_err("rejected");

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_embedder_is_reported() {
        let request = MatchCvRequest {
            cv_text: "Rust engineer with a long history".into(),
            ..MatchCvRequest::default()
        };

        let (status, Json(body)) =
            match_cv(State(state(false).await), Json(request)).await.expect_err("rejected");

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.detail.contains("embedding service is not configured"));
    }

    #[test]
    fn blank_keyword_is_not_a_filter() {
        let request = MatchCvRequest { role_keyword: "   ".into(), ..MatchCvRequest::default() };

        assert!(!request.filters().is_active());
    }
}

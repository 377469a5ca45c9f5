use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use joblab_core::config::MatchingConfig;
use joblab_core::domain::job::{columns, text_field, JobMatch, JobRow};
use joblab_core::errors::ApplicationError;
use joblab_core::matching::{
    dedupe_best, recent_candidates, select_matches, MatchFilters, RelaxationPolicy,
};
use joblab_db::repositories::{CvRepository, RepositoryError};
use joblab_db::{JobQuery, JobStore, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::embeddings::{Embedder, EmbeddingError};

pub const MAX_EMBEDDED_CHARS: usize = 10_000;
pub const MIN_CV_CHARS: usize = 10;
pub const MAX_CV_CHARS: usize = 20_000;
const FILTERED_MATCH_COUNT: u32 = 100;
const UNFILTERED_MATCH_COUNT: u32 = 30;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("cv text must be between 10 and 20000 characters, got {0}")]
    InvalidInput(usize),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<MatchError> for ApplicationError {
    fn from(error: MatchError) -> Self {
        match error {
            MatchError::InvalidInput(_) => ApplicationError::from(
                joblab_core::errors::ValidationError::MalformedInput(error.to_string()),
            ),
            MatchError::Embedding(_) => ApplicationError::Completion(error.to_string()),
            MatchError::Store(_) => ApplicationError::DataStore(error.to_string()),
            MatchError::Repository(_) => ApplicationError::Persistence(error.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CvMatchResult {
    pub cv_id: String,
    pub matches: Vec<JobMatch>,
}

/// Trims, collapses whitespace runs and caps the text sent for embedding.
pub fn normalize_cv_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").chars().take(MAX_EMBEDDED_CHARS).collect()
}

pub struct CvMatcher {
    embedder: Arc<dyn Embedder>,
    jobs: Arc<dyn JobStore>,
    cvs: Arc<dyn CvRepository>,
    policy: RelaxationPolicy,
    candidate_pool: usize,
}

impl CvMatcher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        jobs: Arc<dyn JobStore>,
        cvs: Arc<dyn CvRepository>,
        config: &MatchingConfig,
    ) -> Self {
        Self {
            embedder,
            jobs,
            cvs,
            policy: RelaxationPolicy {
                target_total: config.target_total,
                min_strict: config.min_strict,
                recency_days: config.recency_days,
            },
            candidate_pool: config.candidate_pool,
        }
    }

    pub async fn match_cv(
        &self,
        cv_text: &str,
        filters: &MatchFilters,
    ) -> Result<CvMatchResult, MatchError> {
        self.match_cv_on(cv_text, filters, Utc::now().date_naive()).await
    }

    /// Same as [`CvMatcher::match_cv`] with the recency window anchored at `today`.
    pub async fn match_cv_on(
        &self,
        cv_text: &str,
        filters: &MatchFilters,
        today: NaiveDate,
    ) -> Result<CvMatchResult, MatchError> {
        let length = cv_text.trim().chars().count();
        if !(MIN_CV_CHARS..=MAX_CV_CHARS).contains(&length) {
            return Err(MatchError::InvalidInput(length));
        }

        let normalized = normalize_cv_text(cv_text);
        let embedding = self.embedder.embed(&normalized).await?;
        let cv_id = self.cvs.insert_cv(cv_text, &embedding).await?;
        info!(event_name = "cv.stored", cv_id = %cv_id, dimensions = embedding.len(), "cv stored");

        let match_count =
            if filters.is_active() { FILTERED_MATCH_COUNT } else { UNFILTERED_MATCH_COUNT };
        let chunks = self.jobs.match_chunks(&embedding, match_count).await?;
        let mut ranked = dedupe_best(chunks);
        if ranked.is_empty() {
            warn!(
                event_name = "cv.no_candidates",
                cv_id = %cv_id,
                "vector search returned no jobs"
            );
            self.cvs.update_matches(&cv_id, &serde_json::json!([])).await?;
            return Ok(CvMatchResult { cv_id, matches: Vec::new() });
        }
        ranked.truncate(self.candidate_pool);

        let ids: Vec<String> = ranked.iter().map(|(job_id, _)| job_id.clone()).collect();
        let metadata: HashMap<String, JobRow> = self
            .jobs
            .fetch(&JobQuery::for_ids(&ids))
            .await?
            .into_iter()
            .filter_map(|row| {
                let job_id = text_field(&row, columns::JOB_ID)?.into_owned();
                Some((job_id, row))
            })
            .collect();

        let candidates = recent_candidates(&ranked, &metadata, self.policy.recency_days, today);
        let recent = candidates.len();
        let selected = select_matches(candidates, filters, &self.policy);
        let matches: Vec<JobMatch> = selected
            .iter()
            .map(|candidate| {
                JobMatch::from_row(
                    &candidate.job_id,
                    &candidate.metadata,
                    candidate.similarity,
                    candidate.relaxed,
                )
            })
            .collect();

        let stored = serde_json::to_value(&matches)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        self.cvs.update_matches(&cv_id, &stored).await?;
        info!(
            event_name = "cv.matched",
            cv_id = %cv_id,
            candidates = ranked.len(),
            recent,
            matches = matches.len(),
            relaxed = matches.iter().filter(|job| job.relaxed_criteria).count(),
            "cv matching finished"
        );
        Ok(CvMatchResult { cv_id, matches })
    }
}

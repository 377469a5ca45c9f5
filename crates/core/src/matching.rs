use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::job::{bool_field, columns, text_field, JobRow};

/// One similarity hit from the vector index. A job is split into several
/// chunks, so the same id usually appears more than once.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScoredChunk {
    pub job_id: String,
    #[serde(default)]
    pub similarity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchCandidate {
    pub job_id: String,
    pub similarity: f64,
    pub metadata: JobRow,
    pub relaxed: bool,
}

/// User hard filters for CV matching. Empty lists and unset values do not
/// constrain anything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFilters {
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub job_levels: Vec<String>,
    #[serde(default)]
    pub job_functions: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub is_remote: Option<bool>,
    #[serde(default)]
    pub role_keyword: Option<String>,
}

impl MatchFilters {
    pub fn is_active(&self) -> bool {
        !self.countries.is_empty()
            || !self.job_levels.is_empty()
            || !self.job_functions.is_empty()
            || !self.platforms.is_empty()
            || self.is_remote.is_some()
            || self.keyword().is_some()
    }

    fn keyword(&self) -> Option<&str> {
        self.role_keyword.as_deref().map(str::trim).filter(|keyword| !keyword.is_empty())
    }

    pub fn passes(&self, row: &JobRow) -> bool {
        let member = |allowed: &[String], column: &str| {
            allowed.is_empty()
                || text_field(row, column)
                    .map(|value| allowed.iter().any(|candidate| candidate.as_str() == value))
                    .unwrap_or(false)
        };

        if !member(&self.countries, columns::COUNTRY)
            || !member(&self.job_levels, columns::JOB_LEVEL_STD)
            || !member(&self.job_functions, columns::JOB_FUNCTION_STD)
            || !member(&self.platforms, columns::PLATFORM)
        {
            return false;
        }

        if let Some(remote) = self.is_remote {
            if bool_field(row, columns::IS_REMOTE) != remote {
                return false;
            }
        }

        if let Some(keyword) = self.keyword() {
            let title = text_field(row, columns::ACTUAL_ROLE).unwrap_or_default();
            if !title.to_lowercase().contains(&keyword.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelaxationPolicy {
    pub target_total: usize,
    pub min_strict: usize,
    pub recency_days: i64,
}

impl Default for RelaxationPolicy {
    fn default() -> Self {
        Self { target_total: 10, min_strict: 5, recency_days: 30 }
    }
}

/// Collapses chunk hits to one score per job (the best one), ranked by
/// similarity descending. Ties keep first-seen order.
pub fn dedupe_best(chunks: impl IntoIterator<Item = ScoredChunk>) -> Vec<(String, f64)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut best: Vec<(String, f64)> = Vec::new();

    for chunk in chunks {
        if chunk.job_id.is_empty() {
            continue;
        }
        match index.get(&chunk.job_id) {
            Some(position) => {
                if chunk.similarity > best[*position].1 {
                    best[*position].1 = chunk.similarity;
                }
            }
            None => {
                index.insert(chunk.job_id.clone(), best.len());
                best.push((chunk.job_id, chunk.similarity));
            }
        }
    }

    best.sort_by(|left, right| right.1.total_cmp(&left.1));
    best
}

/// Candidates posted within the recency window. Undated postings stay in;
/// candidates without metadata are dropped.
pub fn recent_candidates(
    ranked: &[(String, f64)],
    metadata: &HashMap<String, JobRow>,
    recency_days: i64,
    today: NaiveDate,
) -> Vec<MatchCandidate> {
    let cutoff = (today - Duration::days(recency_days)).format("%Y-%m-%d").to_string();

    ranked
        .iter()
        .filter_map(|(job_id, similarity)| {
            let row = metadata.get(job_id)?;
            let recent = match text_field(row, columns::POSTED_DATE) {
                Some(posted) if !posted.is_empty() => &*posted >= cutoff.as_str(),
                _ => true,
            };
            recent.then(|| MatchCandidate {
                job_id: job_id.clone(),
                similarity: *similarity,
                metadata: row.clone(),
                relaxed: false,
            })
        })
        .collect()
}

/// Strict/relaxed selection over recency-filtered candidates already ranked
/// by similarity.
///
/// With no active filters the top `target_total` candidates are returned.
/// Otherwise, when at least `min_strict` candidates pass every filter only
/// strict ones are returned; below that threshold the remainder is backfilled
/// with the best relaxed candidates, flagged `relaxed = true`.
pub fn select_matches(
    candidates: Vec<MatchCandidate>,
    filters: &MatchFilters,
    policy: &RelaxationPolicy,
) -> Vec<MatchCandidate> {
    if !filters.is_active() {
        return candidates.into_iter().take(policy.target_total).collect();
    }

    let (strict, relaxed): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|candidate| filters.passes(&candidate.metadata));

    tracing::debug!(
        event_name = "matching.partitioned",
        strict = strict.len(),
        relaxed = relaxed.len(),
        "candidates split by user filters"
    );

    let mut selected: Vec<MatchCandidate> = strict.into_iter().take(policy.target_total).collect();
    if selected.len() < policy.min_strict {
        let needed = policy.target_total.saturating_sub(selected.len());
        selected.extend(relaxed.into_iter().take(needed).map(|mut candidate| {
            candidate.relaxed = true;
            candidate
        }));
    }

    selected
}

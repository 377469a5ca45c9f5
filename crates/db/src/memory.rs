use async_trait::async_trait;
use joblab_core::domain::job::JobRow;
use joblab_core::matching::ScoredChunk;
use tokio::sync::RwLock;

use crate::query::JobQuery;
use crate::store::{JobStore, StoreError};

/// Job store held in process memory. Queries are evaluated locally with the
/// same filter semantics the remote store applies.
#[derive(Default)]
pub struct InMemoryJobStore {
    rows: RwLock<Vec<JobRow>>,
    chunks: RwLock<Vec<ScoredChunk>>,
    queries: RwLock<Vec<JobQuery>>,
    unavailable: RwLock<Option<String>>,
}

impl InMemoryJobStore {
    pub fn with_rows(rows: Vec<JobRow>) -> Self {
        Self { rows: RwLock::new(rows), ..Self::default() }
    }

    pub async fn insert_rows(&self, rows: impl IntoIterator<Item = JobRow>) {
        self.rows.write().await.extend(rows);
    }

    pub async fn insert_chunks(&self, chunks: impl IntoIterator<Item = ScoredChunk>) {
        self.chunks.write().await.extend(chunks);
    }

    /// Every subsequent call fails with a 503 carrying `reason` until cleared.
    pub async fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.write().await = reason.map(str::to_owned);
    }

    pub async fn recorded_queries(&self) -> Vec<JobQuery> {
        self.queries.read().await.clone()
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        match self.unavailable.read().await.as_ref() {
            Some(reason) => Err(StoreError::Status { status: 503, body: reason.clone() }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn fetch(&self, query: &JobQuery) -> Result<Vec<JobRow>, StoreError> {
        self.queries.write().await.push(query.clone());
        self.check_available().await?;
        let rows = self.rows.read().await;
        Ok(query.apply(&rows))
    }

    async fn match_chunks(
        &self,
        _embedding: &[f32],
        match_count: u32,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        self.check_available().await?;
        let chunks = self.chunks.read().await;
        Ok(chunks.iter().take(match_count as usize).cloned().collect())
    }
}

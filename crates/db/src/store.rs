use std::time::Duration;

use async_trait::async_trait;
use joblab_core::config::DataStoreConfig;
use joblab_core::domain::job::JobRow;
use joblab_core::matching::ScoredChunk;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::query::JobQuery;

const JOBS_TABLE: &str = "jobs";
const MATCH_CHUNKS_RPC: &str = "match_job_chunks";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("data store transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("data store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("data store response could not be decoded: {0}")]
    Decode(String),
}

/// Read access to the remote jobs table and its vector index.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn fetch(&self, query: &JobQuery) -> Result<Vec<JobRow>, StoreError>;

    /// Nearest job chunks to `embedding`, best first.
    async fn match_chunks(
        &self,
        embedding: &[f32],
        match_count: u32,
    ) -> Result<Vec<ScoredChunk>, StoreError>;
}

pub struct PostgrestJobStore {
    client: reqwest::Client,
    base_url: String,
    service_key: SecretString,
}

impl PostgrestJobStore {
    pub fn new(config: &DataStoreConfig) -> Result<Self, StoreError> {
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self::with_client(client, &config.url, config.service_key.clone()))
    }

    pub fn with_client(client: reqwest::Client, url: &str, service_key: SecretString) -> Self {
        let base_url = format!("{}/rest/v1", url.trim_end_matches('/'));
        Self { client, base_url, service_key }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.service_key.expose_secret();
        request.header("apikey", key).bearer_auth(key)
    }

    async fn read_rows<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Vec<T>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "store.request.failed",
                status = status.as_u16(),
                "data store rejected request"
            );
            return Err(StoreError::Status { status: status.as_u16(), body });
        }
        response.json::<Vec<T>>().await.map_err(|error| StoreError::Decode(error.to_string()))
    }
}

#[async_trait]
impl JobStore for PostgrestJobStore {
    async fn fetch(&self, query: &JobQuery) -> Result<Vec<JobRow>, StoreError> {
        let params = query.to_params();
        debug!(event_name = "store.fetch", params = ?params, "querying jobs table");

        let request =
            self.client.get(format!("{}/{JOBS_TABLE}", self.base_url)).query(&params);
        let response = self.authorize(request).send().await?;
        let rows: Vec<JobRow> = Self::read_rows(response).await?;

        debug!(event_name = "store.fetch.completed", rows = rows.len(), "jobs fetched");
        Ok(rows)
    }

    async fn match_chunks(
        &self,
        embedding: &[f32],
        match_count: u32,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let request = self
            .client
            .post(format!("{}/rpc/{MATCH_CHUNKS_RPC}", self.base_url))
            .json(&json!({ "query_embedding": embedding, "match_count": match_count }));
        let response = self.authorize(request).send().await?;
        let chunks: Vec<ScoredChunk> = Self::read_rows(response).await?;

        debug!(
            event_name = "store.match_chunks.completed",
            chunks = chunks.len(),
            "vector search done"
        );
        Ok(chunks)
    }
}

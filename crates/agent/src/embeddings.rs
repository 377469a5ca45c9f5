use std::time::Duration;

use async_trait::async_trait;
use joblab_core::config::EmbeddingsConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyText,
    #[error("embedding service url is not configured")]
    NotConfigured,
    #[error("embedding transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("embedding service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("embedding response carried no vector")]
    EmptyVector,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedding endpoint taking `{inputText, dimensions, normalize}` and
/// answering `{embedding}`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
    dimensions: u32,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self, EmbeddingError> {
        let url = config.url.clone().ok_or(EmbeddingError::NotConfigured)?;
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { client, url, api_key: config.api_key.clone(), dimensions: config.dimensions })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let mut request = self.client.post(&self.url).json(&json!({
            "inputText": text,
            "dimensions": self.dimensions,
            "normalize": true,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status { status: status.as_u16(), body });
        }

        let body: EmbeddingResponse = response.json().await?;
        if body.embedding.is_empty() {
            return Err(EmbeddingError::EmptyVector);
        }
        debug!(
            event_name = "embedding.generated",
            dimensions = body.embedding.len(),
            "text embedded"
        );
        Ok(body.embedding)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

pub mod cv;
pub mod memory;

pub use cv::SqlCvRepository;
pub use memory::InMemoryCvRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CvRecord {
    pub id: String,
    pub raw_text: String,
    pub embedding: Vec<f32>,
    pub top_matches: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Uploaded CVs with their embedding and the last computed matches.
#[async_trait]
pub trait CvRepository: Send + Sync {
    async fn insert_cv(&self, raw_text: &str, embedding: &[f32]) -> Result<String, RepositoryError>;
    async fn update_matches(&self, cv_id: &str, matches: &Value) -> Result<(), RepositoryError>;
    async fn find(&self, cv_id: &str) -> Result<Option<CvRecord>, RepositoryError>;
}

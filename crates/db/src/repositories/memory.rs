use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{CvRecord, CvRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCvRepository {
    cvs: RwLock<HashMap<String, CvRecord>>,
}

impl InMemoryCvRepository {
    pub async fn len(&self) -> usize {
        self.cvs.read().await.len()
    }
}

#[async_trait::async_trait]
impl CvRepository for InMemoryCvRepository {
    async fn insert_cv(
        &self,
        raw_text: &str,
        embedding: &[f32],
    ) -> Result<String, RepositoryError> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = CvRecord {
            id: id.clone(),
            raw_text: raw_text.to_owned(),
            embedding: embedding.to_vec(),
            top_matches: None,
            created_at: Utc::now(),
        };
        self.cvs.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn update_matches(&self, cv_id: &str, matches: &Value) -> Result<(), RepositoryError> {
        let mut cvs = self.cvs.write().await;
        let record =
            cvs.get_mut(cv_id).ok_or_else(|| RepositoryError::NotFound(cv_id.to_owned()))?;
        record.top_matches = Some(matches.clone());
        Ok(())
    }

    async fn find(&self, cv_id: &str) -> Result<Option<CvRecord>, RepositoryError> {
        Ok(self.cvs.read().await.get(cv_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::InMemoryCvRepository;
    use crate::repositories::{CvRepository, RepositoryError};

    #[tokio::test]
    async fn in_memory_repository_round_trips_matches() {
        let repo = InMemoryCvRepository::default();

        let id = repo.insert_cv("Data analyst", &[1.0]).await.expect("insert");
        repo.update_matches(&id, &json!([])).await.expect("update");

        let stored = repo.find(&id).await.expect("find").expect("exists");
        assert_eq!(stored.top_matches, Some(json!([])));
        assert_eq!(repo.len().await, 1);
        assert!(matches!(
            repo.update_matches("other", &json!([])).await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}

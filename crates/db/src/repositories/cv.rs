use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row};

use super::{CvRecord, CvRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCvRepository {
    pool: DbPool,
}

impl SqlCvRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CvRepository for SqlCvRepository {
    async fn insert_cv(
        &self,
        raw_text: &str,
        embedding: &[f32],
    ) -> Result<String, RepositoryError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let embedding_json = serde_json::to_string(embedding)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO user_cvs
                (id, raw_text, embedding_json, top_matches_json, created_at, updated_at)
            VALUES (?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(raw_text)
        .bind(embedding_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_matches(&self, cv_id: &str, matches: &Value) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE user_cvs SET top_matches_json = ?, updated_at = ? WHERE id = ?")
                .bind(matches.to_string())
                .bind(Utc::now().to_rfc3339())
                .bind(cv_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(cv_id.to_owned()));
        }
        Ok(())
    }

    async fn find(&self, cv_id: &str) -> Result<Option<CvRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, raw_text, embedding_json, top_matches_json, created_at
            FROM user_cvs
            WHERE id = ?
            "#,
        )
        .bind(cv_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| decode_row(&row)).transpose()
    }
}

fn decode_row(row: &SqliteRow) -> Result<CvRecord, RepositoryError> {
    let embedding_json: String = row.try_get("embedding_json")?;
    let embedding = serde_json::from_str(&embedding_json)
        .map_err(|error| RepositoryError::Decode(format!("embedding_json: {error}")))?;

    let top_matches = row
        .try_get::<Option<String>, _>("top_matches_json")?
        .map(|raw| serde_json::from_str::<Value>(&raw))
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("top_matches_json: {error}")))?;

    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("created_at: {error}")))?;

    Ok(CvRecord {
        id: row.try_get("id")?,
        raw_text: row.try_get("raw_text")?,
        embedding,
        top_matches,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SqlCvRepository;
    use crate::repositories::{CvRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlCvRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlCvRepository::new(pool)
    }

    #[tokio::test]
    async fn stores_cv_and_matches() {
        let repo = repository().await;

        let id = repo.insert_cv("Rust engineer, 5 years", &[0.25, -0.5]).await.expect("insert");
        let stored = repo.find(&id).await.expect("find").expect("cv exists");
        assert_eq!(stored.raw_text, "Rust engineer, 5 years");
        assert_eq!(stored.embedding, vec![0.25, -0.5]);
        assert_eq!(stored.top_matches, None);

        let matches = json!([{ "job_id": "j1", "similarity": 0.91 }]);
        repo.update_matches(&id, &matches).await.expect("update");
        let stored = repo.find(&id).await.expect("find").expect("cv exists");
        assert_eq!(stored.top_matches, Some(matches));
    }

    #[tokio::test]
    async fn updating_unknown_cv_is_not_found() {
        let repo = repository().await;

        let result = repo.update_matches("missing", &json!([])).await;

        assert!(matches!(result, Err(RepositoryError::NotFound(id)) if id == "missing"));
        assert!(repo.find("missing").await.expect("find").is_none());
    }
}

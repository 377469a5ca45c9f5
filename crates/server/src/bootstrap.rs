use std::sync::Arc;

use joblab_agent::{
    AgentRuntime, AnthropicClient, CvMatcher, DialoguePolicy, EmbeddingError, HttpEmbedder,
    InMemoryConversationMemory, LlmError, ToolRouter,
};
use joblab_core::config::{AppConfig, ConfigError, LoadOptions};
use joblab_db::repositories::SqlCvRepository;
use joblab_db::{connect, migrations, DbPool, JobStore, PageSpec, PostgrestJobStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::AppState;
use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

impl Application {
    pub fn health_state(&self) -> HealthState {
        HealthState::new(self.db_pool.clone())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("data store client could not be built: {0}")]
    DataStore(#[from] StoreError),
    #[error("completion client could not be built: {0}")]
    Completion(#[from] LlmError),
    #[error("embedding client could not be built: {0}")]
    Embeddings(#[source] EmbeddingError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.cv_store_ready",
        correlation_id = "bootstrap",
        "cv store connected and migrated"
    );

    let store: Arc<dyn JobStore> = Arc::new(PostgrestJobStore::new(&config.datastore)?);
    let pages =
        PageSpec { page_size: config.datastore.page_size, max_rows: config.datastore.max_rows };
    let runtime = AgentRuntime::new(
        Arc::new(AnthropicClient::new(&config.llm)?),
        ToolRouter::new(store.clone(), pages),
        Arc::new(InMemoryConversationMemory::from_config(&config.memory)),
        DialoguePolicy::from(&config.agent),
    );

    let matcher = match HttpEmbedder::new(&config.embeddings) {
        Ok(embedder) => Some(Arc::new(CvMatcher::new(
            Arc::new(embedder),
            store,
            Arc::new(SqlCvRepository::new(db_pool.clone())),
            &config.matching,
        ))),
        Err(EmbeddingError::NotConfigured) => {
            warn!(
                event_name = "system.bootstrap.cv_matching_disabled",
                correlation_id = "bootstrap",
                "embeddings.url is not set; cv matching is disabled"
            );
            None
        }
        Err(error) => return Err(BootstrapError::Embeddings(error)),
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        model = runtime.model(),
        cv_matching = matcher.is_some(),
        "application bootstrap finished"
    );
    Ok(Application { config, db_pool, state: AppState { runtime: Arc::new(runtime), matcher } })
}

#[cfg(test)]
mod tests {
    use joblab_core::config::AppConfig;
    use secrecy::SecretString;

    use super::{bootstrap_with_config, BootstrapError};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        config.datastore.url = "http://127.0.0.1:54321".to_string();
        config.datastore.service_key = SecretString::from("service-key".to_string());
        config.llm.api_key = Some(SecretString::from("llm-key".to_string()));
        config
    }

    #[tokio::test]
    async fn bootstrap_migrates_cv_store_and_disables_matching_without_embedder() {
        let app = bootstrap_with_config(config()).await.expect("bootstrap should succeed");

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'user_cvs'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("query schema");
        assert_eq!(count, 1);
        assert!(app.state.matcher.is_none());
        assert_eq!(app.state.runtime.model(), app.config.llm.model);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_enables_matching_with_embedder() {
        let mut config = config();
        config.embeddings.url = Some("http://127.0.0.1:9/embed".to_string());

        let app = bootstrap_with_config(config).await.expect("bootstrap should succeed");

        assert!(app.state.matcher.is_some());
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn missing_llm_key_fails_bootstrap() {
        let mut config = config();
        config.llm.api_key = None;

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::Completion(_))));
    }
}

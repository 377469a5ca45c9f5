use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub datastore: DataStoreConfig,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingsConfig,
    pub agent: AgentConfig,
    pub memory: MemoryConfig,
    pub matching: MatchingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Local SQLite store holding uploaded CVs and their computed matches.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Remote jobs data store (PostgREST endpoint).
#[derive(Clone, Debug)]
pub struct DataStoreConfig {
    pub url: String,
    pub service_key: SecretString,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub max_rows: u32,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingsConfig {
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub dimensions: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_tool_rounds: u32,
    pub max_soft_retries: u32,
    pub short_prompt_tokens: usize,
}

#[derive(Clone, Debug)]
pub struct MemoryConfig {
    pub max_conversations: usize,
    pub ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MatchingConfig {
    pub target_total: usize,
    pub min_strict: usize,
    pub recency_days: i64,
    pub candidate_pool: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub datastore_url: Option<String>,
    pub datastore_service_key: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub embeddings_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://joblab.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            datastore: DataStoreConfig {
                url: String::new(),
                service_key: String::new().into(),
                timeout_secs: 15,
                page_size: 1000,
                max_rows: 15_000,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-5-haiku-20241022".to_string(),
                max_tokens: 1024,
                temperature: 0.7,
                timeout_secs: 30,
            },
            embeddings: EmbeddingsConfig {
                url: None,
                api_key: None,
                dimensions: 512,
                timeout_secs: 15,
            },
            agent: AgentConfig { max_tool_rounds: 5, max_soft_retries: 2, short_prompt_tokens: 6 },
            memory: MemoryConfig { max_conversations: 10_000, ttl_secs: 86_400 },
            matching: MatchingConfig {
                target_total: 10,
                min_strict: 5,
                recency_days: 30,
                candidate_pool: 50,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                cors_origins: vec!["http://localhost:3000".to_string()],
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("joblab.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(datastore) = patch.datastore {
            if let Some(url) = datastore.url {
                self.datastore.url = url;
            }
            if let Some(service_key) = datastore.service_key {
                self.datastore.service_key = secret_value(service_key);
            }
            if let Some(timeout_secs) = datastore.timeout_secs {
                self.datastore.timeout_secs = timeout_secs;
            }
            if let Some(page_size) = datastore.page_size {
                self.datastore.page_size = page_size;
            }
            if let Some(max_rows) = datastore.max_rows {
                self.datastore.max_rows = max_rows;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(embeddings) = patch.embeddings {
            if let Some(url) = embeddings.url {
                self.embeddings.url = Some(url);
            }
            if let Some(api_key) = embeddings.api_key {
                self.embeddings.api_key = Some(secret_value(api_key));
            }
            if let Some(dimensions) = embeddings.dimensions {
                self.embeddings.dimensions = dimensions;
            }
            if let Some(timeout_secs) = embeddings.timeout_secs {
                self.embeddings.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_tool_rounds) = agent.max_tool_rounds {
                self.agent.max_tool_rounds = max_tool_rounds;
            }
            if let Some(max_soft_retries) = agent.max_soft_retries {
                self.agent.max_soft_retries = max_soft_retries;
            }
            if let Some(short_prompt_tokens) = agent.short_prompt_tokens {
                self.agent.short_prompt_tokens = short_prompt_tokens;
            }
        }

        if let Some(memory) = patch.memory {
            if let Some(max_conversations) = memory.max_conversations {
                self.memory.max_conversations = max_conversations;
            }
            if let Some(ttl_secs) = memory.ttl_secs {
                self.memory.ttl_secs = ttl_secs;
            }
        }

        if let Some(matching) = patch.matching {
            if let Some(target_total) = matching.target_total {
                self.matching.target_total = target_total;
            }
            if let Some(min_strict) = matching.min_strict {
                self.matching.min_strict = min_strict;
            }
            if let Some(recency_days) = matching.recency_days {
                self.matching.recency_days = recency_days;
            }
            if let Some(candidate_pool) = matching.candidate_pool {
                self.matching.candidate_pool = candidate_pool;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(cors_origins) = server.cors_origins {
                self.server.cors_origins = cors_origins;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("JOBLAB_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("JOBLAB_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_num("JOBLAB_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("JOBLAB_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_num("JOBLAB_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("JOBLAB_DATASTORE_URL") {
            self.datastore.url = value;
        }
        if let Some(value) = read_env("JOBLAB_DATASTORE_SERVICE_KEY") {
            self.datastore.service_key = secret_value(value);
        }
        if let Some(value) = read_env("JOBLAB_DATASTORE_TIMEOUT_SECS") {
            self.datastore.timeout_secs = parse_num("JOBLAB_DATASTORE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("JOBLAB_DATASTORE_PAGE_SIZE") {
            self.datastore.page_size = parse_num("JOBLAB_DATASTORE_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("JOBLAB_DATASTORE_MAX_ROWS") {
            self.datastore.max_rows = parse_num("JOBLAB_DATASTORE_MAX_ROWS", &value)?;
        }

        if let Some(value) = read_env("JOBLAB_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("JOBLAB_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("JOBLAB_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("JOBLAB_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_num("JOBLAB_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("JOBLAB_LLM_TEMPERATURE") {
            self.llm.temperature = parse_num("JOBLAB_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("JOBLAB_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_num("JOBLAB_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("JOBLAB_EMBEDDINGS_URL") {
            self.embeddings.url = Some(value);
        }
        if let Some(value) = read_env("JOBLAB_EMBEDDINGS_API_KEY") {
            self.embeddings.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("JOBLAB_EMBEDDINGS_DIMENSIONS") {
            self.embeddings.dimensions = parse_num("JOBLAB_EMBEDDINGS_DIMENSIONS", &value)?;
        }

        if let Some(value) = read_env("JOBLAB_AGENT_MAX_TOOL_ROUNDS") {
            self.agent.max_tool_rounds = parse_num("JOBLAB_AGENT_MAX_TOOL_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("JOBLAB_AGENT_MAX_SOFT_RETRIES") {
            self.agent.max_soft_retries = parse_num("JOBLAB_AGENT_MAX_SOFT_RETRIES", &value)?;
        }

        if let Some(value) = read_env("JOBLAB_MEMORY_MAX_CONVERSATIONS") {
            self.memory.max_conversations = parse_num("JOBLAB_MEMORY_MAX_CONVERSATIONS", &value)?;
        }
        if let Some(value) = read_env("JOBLAB_MEMORY_TTL_SECS") {
            self.memory.ttl_secs = parse_num("JOBLAB_MEMORY_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("JOBLAB_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("JOBLAB_SERVER_PORT") {
            self.server.port = parse_num("JOBLAB_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("JOBLAB_SERVER_CORS_ORIGINS") {
            self.server.cors_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }

        let log_level = read_env("JOBLAB_LOGGING_LEVEL").or_else(|| read_env("JOBLAB_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("JOBLAB_LOGGING_FORMAT").or_else(|| read_env("JOBLAB_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(datastore_url) = overrides.datastore_url {
            self.datastore.url = datastore_url;
        }
        if let Some(service_key) = overrides.datastore_service_key {
            self.datastore.service_key = secret_value(service_key);
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(url) = overrides.embeddings_url {
            self.embeddings.url = Some(url);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_datastore(&self.datastore)?;
        validate_llm(&self.llm)?;
        validate_embeddings(&self.embeddings)?;
        validate_agent(&self.agent)?;
        validate_memory(&self.memory)?;
        validate_matching(&self.matching)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("joblab.toml"), PathBuf::from("config/joblab.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn check_timeout(field: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 300 {
        return Err(ConfigError::Validation(format!("{field} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    check_timeout("database.timeout_secs", database.timeout_secs)
}

fn validate_datastore(datastore: &DataStoreConfig) -> Result<(), ConfigError> {
    let url = datastore.url.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(
            "datastore.url is required (the PostgREST base URL of the jobs database)".to_string(),
        ));
    }
    if !is_http_url(url) {
        return Err(ConfigError::Validation(
            "datastore.url must start with http:// or https://".to_string(),
        ));
    }

    if datastore.service_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation("datastore.service_key is required".to_string()));
    }

    check_timeout("datastore.timeout_secs", datastore.timeout_secs)?;

    if datastore.page_size == 0 || datastore.page_size > 10_000 {
        return Err(ConfigError::Validation(
            "datastore.page_size must be in range 1..=10000".to_string(),
        ));
    }
    if datastore.max_rows < datastore.page_size {
        return Err(ConfigError::Validation(
            "datastore.max_rows must be at least datastore.page_size".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    check_timeout("llm.timeout_secs", llm.timeout_secs)?;

    let missing =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }

    if !is_http_url(llm.base_url.trim()) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=1.0".to_string(),
        ));
    }

    Ok(())
}

fn validate_embeddings(embeddings: &EmbeddingsConfig) -> Result<(), ConfigError> {
    if let Some(url) = &embeddings.url {
        if !is_http_url(url.trim()) {
            return Err(ConfigError::Validation(
                "embeddings.url must start with http:// or https://".to_string(),
            ));
        }
    }
    if embeddings.dimensions == 0 {
        return Err(ConfigError::Validation(
            "embeddings.dimensions must be greater than zero".to_string(),
        ));
    }
    check_timeout("embeddings.timeout_secs", embeddings.timeout_secs)
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_tool_rounds == 0 || agent.max_tool_rounds > 20 {
        return Err(ConfigError::Validation(
            "agent.max_tool_rounds must be in range 1..=20".to_string(),
        ));
    }
    if agent.max_soft_retries >= agent.max_tool_rounds {
        return Err(ConfigError::Validation(
            "agent.max_soft_retries must be lower than agent.max_tool_rounds".to_string(),
        ));
    }
    if agent.short_prompt_tokens == 0 {
        return Err(ConfigError::Validation(
            "agent.short_prompt_tokens must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
    if memory.max_conversations == 0 {
        return Err(ConfigError::Validation(
            "memory.max_conversations must be greater than zero".to_string(),
        ));
    }
    if memory.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "memory.ttl_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_matching(matching: &MatchingConfig) -> Result<(), ConfigError> {
    if matching.target_total == 0 {
        return Err(ConfigError::Validation(
            "matching.target_total must be greater than zero".to_string(),
        ));
    }
    if matching.min_strict > matching.target_total {
        return Err(ConfigError::Validation(
            "matching.min_strict must not exceed matching.target_total".to_string(),
        ));
    }
    if matching.recency_days <= 0 {
        return Err(ConfigError::Validation(
            "matching.recency_days must be greater than zero".to_string(),
        ));
    }
    if matching.candidate_pool < matching.target_total {
        return Err(ConfigError::Validation(
            "matching.candidate_pool must be at least matching.target_total".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    datastore: Option<DataStorePatch>,
    llm: Option<LlmPatch>,
    embeddings: Option<EmbeddingsPatch>,
    agent: Option<AgentPatch>,
    memory: Option<MemoryPatch>,
    matching: Option<MatchingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DataStorePatch {
    url: Option<String>,
    service_key: Option<String>,
    timeout_secs: Option<u64>,
    page_size: Option<u32>,
    max_rows: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingsPatch {
    url: Option<String>,
    api_key: Option<String>,
    dimensions: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_tool_rounds: Option<u32>,
    max_soft_retries: Option<u32>,
    short_prompt_tokens: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryPatch {
    max_conversations: Option<usize>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    target_total: Option<usize>,
    min_strict: Option<usize>,
    recency_days: Option<i64>,
    candidate_pool: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    cors_origins: Option<Vec<String>>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use joblab_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("config", error),
    };

    let path = detect_config_path();
    let doc = load_config_file_doc(path.as_deref());
    let sources = Sources { doc: doc.as_ref(), path: path.as_deref() };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in effective_values(&config) {
        lines.push(render_line(key, &value, sources.of(key, env_key)));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String, Option<&'static str>)> {
    vec![
        ("database.url", config.database.url.clone(), Some("JOBLAB_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("JOBLAB_DATABASE_MAX_CONNECTIONS"),
        ),
        ("datastore.url", config.datastore.url.clone(), Some("JOBLAB_DATASTORE_URL")),
        (
            "datastore.service_key",
            redact_token(config.datastore.service_key.expose_secret()),
            Some("JOBLAB_DATASTORE_SERVICE_KEY"),
        ),
        (
            "datastore.page_size",
            config.datastore.page_size.to_string(),
            Some("JOBLAB_DATASTORE_PAGE_SIZE"),
        ),
        (
            "datastore.max_rows",
            config.datastore.max_rows.to_string(),
            Some("JOBLAB_DATASTORE_MAX_ROWS"),
        ),
        ("llm.base_url", config.llm.base_url.clone(), Some("JOBLAB_LLM_BASE_URL")),
        ("llm.model", config.llm.model.clone(), Some("JOBLAB_LLM_MODEL")),
        ("llm.api_key", redact_optional(config.llm.api_key.as_ref()), Some("JOBLAB_LLM_API_KEY")),
        (
            "embeddings.url",
            config.embeddings.url.clone().unwrap_or_else(|| "<unset>".to_string()),
            Some("JOBLAB_EMBEDDINGS_URL"),
        ),
        (
            "embeddings.api_key",
            redact_optional(config.embeddings.api_key.as_ref()),
            Some("JOBLAB_EMBEDDINGS_API_KEY"),
        ),
        (
            "agent.max_tool_rounds",
            config.agent.max_tool_rounds.to_string(),
            Some("JOBLAB_AGENT_MAX_TOOL_ROUNDS"),
        ),
        (
            "agent.max_soft_retries",
            config.agent.max_soft_retries.to_string(),
            Some("JOBLAB_AGENT_MAX_SOFT_RETRIES"),
        ),
        (
            "memory.max_conversations",
            config.memory.max_conversations.to_string(),
            Some("JOBLAB_MEMORY_MAX_CONVERSATIONS"),
        ),
        ("memory.ttl_secs", config.memory.ttl_secs.to_string(), Some("JOBLAB_MEMORY_TTL_SECS")),
        ("matching.target_total", config.matching.target_total.to_string(), None),
        ("matching.recency_days", config.matching.recency_days.to_string(), None),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            Some("JOBLAB_SERVER_BIND_ADDRESS"),
        ),
        ("server.port", config.server.port.to_string(), Some("JOBLAB_SERVER_PORT")),
        (
            "server.cors_origins",
            config.server.cors_origins.join(","),
            Some("JOBLAB_SERVER_CORS_ORIGINS"),
        ),
        ("logging.level", config.logging.level.clone(), Some("JOBLAB_LOGGING_LEVEL")),
        ("logging.format", format!("{:?}", config.logging.format), Some("JOBLAB_LOGGING_FORMAT")),
    ]
}

struct Sources<'a> {
    doc: Option<&'a Value>,
    path: Option<&'a Path>,
}

impl Sources<'_> {
    fn of(&self, key_path: &str, env_key: Option<&str>) -> String {
        if let Some(env_key) = env_key {
            if env::var_os(env_key).is_some() {
                return format!("env ({env_key})");
            }
        }

        if let Some(doc) = self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("joblab.toml"), PathBuf::from("config/joblab.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    secret.map(|value| redact_token(value.expose_secret())).unwrap_or_else(|| "<unset>".to_string())
}

/// Keeps at most the vendor prefix of a key (`sk-***`).
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("sk-ant-secret"), "sk-***");
        assert_eq!(redact_token("plainsecret"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_config_documents() {
        let doc: Value = "[llm]\nmodel = \"m\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}

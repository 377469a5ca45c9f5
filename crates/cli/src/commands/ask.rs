use std::sync::Arc;

use joblab_agent::{
    AgentRuntime, AnthropicClient, DialoguePolicy, InMemoryConversationMemory, ToolRouter,
};
use joblab_core::config::{AppConfig, LoadOptions};
use joblab_db::{PageSpec, PostgrestJobStore};

use crate::commands::{current_thread_runtime, CommandResult, EXIT_RUNTIME};

pub fn run(prompt: &str, conversation_id: Option<&str>) -> CommandResult {
    if prompt.trim().is_empty() {
        return runtime_failure("invalid_input", "prompt must not be empty");
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("ask", error),
    };

    let runtime = match build_runtime(&config) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let executor = match current_thread_runtime("ask") {
        Ok(executor) => executor,
        Err(failure) => return failure,
    };

    let conversation_id = conversation_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or("cli")
        .to_owned();

    match executor.block_on(runtime.ask(&conversation_id, prompt)) {
        Ok(answer) => match serde_json::to_string_pretty(&answer) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => runtime_failure("serialization", error.to_string()),
        },
        Err(error) => runtime_failure("completion", error.to_string()),
    }
}

fn build_runtime(config: &AppConfig) -> Result<AgentRuntime, CommandResult> {
    let store = PostgrestJobStore::new(&config.datastore)
        .map_err(|error| runtime_failure("datastore_client", error.to_string()))?;
    let llm = AnthropicClient::new(&config.llm)
        .map_err(|error| runtime_failure("completion_client", error.to_string()))?;
    let pages =
        PageSpec { page_size: config.datastore.page_size, max_rows: config.datastore.max_rows };

    Ok(AgentRuntime::new(
        Arc::new(llm),
        ToolRouter::new(Arc::new(store), pages),
        Arc::new(InMemoryConversationMemory::from_config(&config.memory)),
        DialoguePolicy::from(&config.agent),
    ))
}

fn runtime_failure(error_class: &str, message: impl Into<String>) -> CommandResult {
    CommandResult::failure("ask", error_class, message, EXIT_RUNTIME)
}

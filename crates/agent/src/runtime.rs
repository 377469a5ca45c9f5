use std::sync::Arc;

use joblab_core::config::AgentConfig;
use joblab_core::errors::ApplicationError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::conversation::{
    context_hint, expand_followup, followup_summary_request, token_count, IntentLexicon,
    DECLINE_ACKNOWLEDGEMENT, NO_TOOL_REFUSAL, ROUNDS_EXHAUSTED, SYSTEM_PROMPT, TOOL_REQUIRED_NUDGE,
};
use crate::guardrails::GuardrailPolicy;
use crate::llm::{CompletionClient, CompletionReply, CompletionRequest, LlmError, Message, Usage};
use crate::memory::{ConversationMemory, PendingFollowup, ToolInvocation};
use crate::tools::{ToolOutcome, ToolRouter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DialoguePolicy {
    pub max_tool_rounds: u32,
    pub max_soft_retries: u32,
    /// Prompts with at most this many words inherit the previous tool context.
    pub short_prompt_tokens: usize,
}

impl Default for DialoguePolicy {
    fn default() -> Self {
        Self { max_tool_rounds: 5, max_soft_retries: 2, short_prompt_tokens: 6 }
    }
}

impl From<&AgentConfig> for DialoguePolicy {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds,
            max_soft_retries: config.max_soft_retries,
            short_prompt_tokens: config.short_prompt_tokens,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentAnswer {
    pub answer: String,
    pub model: String,
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    pub conversation_id: String,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Completion(#[from] LlmError),
}

impl From<AgentError> for ApplicationError {
    fn from(error: AgentError) -> Self {
        ApplicationError::Completion(error.to_string())
    }
}

/// Drives one user turn: follow-up resolution, then the bounded
/// completion/tool loop. Memory writes from finished rounds stay in place
/// when a later round fails.
pub struct AgentRuntime {
    llm: Arc<dyn CompletionClient>,
    tools: ToolRouter,
    guardrails: GuardrailPolicy,
    memory: Arc<dyn ConversationMemory>,
    lexicon: IntentLexicon,
    policy: DialoguePolicy,
}

struct Turn<'a> {
    conversation_id: &'a str,
    prompt: &'a str,
    database_related: bool,
    messages: Vec<Message>,
    collected: Vec<ToolInvocation>,
    soft_retries: u32,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        tools: ToolRouter,
        memory: Arc<dyn ConversationMemory>,
        policy: DialoguePolicy,
    ) -> Self {
        Self {
            llm,
            tools,
            guardrails: GuardrailPolicy::default(),
            memory,
            lexicon: IntentLexicon::default(),
            policy,
        }
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_lexicon(mut self, lexicon: IntentLexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub async fn ask(
        &self,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<AgentAnswer, AgentError> {
        if let Some(pending) = self.memory.pending_followup(conversation_id).await {
            if self.lexicon.is_negative(prompt) {
                self.memory.clear_pending_followup(conversation_id).await;
                info!(
                    event_name = "dialogue.followup.declined",
                    conversation_id,
                    "follow-up declined"
                );
                let answer = DECLINE_ACKNOWLEDGEMENT.to_owned();
                return Ok(self.answer(conversation_id, answer, None, Vec::new()));
            }
            if self.lexicon.is_affirmative(prompt) {
                self.memory.clear_pending_followup(conversation_id).await;
                return self.run_followup(conversation_id, pending).await;
            }
        }

        let last_tool = self.memory.last_tool(conversation_id).await;
        let short = token_count(prompt) <= self.policy.short_prompt_tokens;
        let opening = match &last_tool {
            Some(last) if short => context_hint(last, prompt, self.lexicon.is_affirmative(prompt)),
            _ => prompt.to_owned(),
        };

        let mut turn = Turn {
            conversation_id,
            prompt,
            database_related: self.lexicon.mentions_database(prompt)
                || (last_tool.is_some() && short),
            messages: vec![Message::user(opening)],
            collected: Vec::new(),
            soft_retries: 0,
        };
        debug!(
            event_name = "dialogue.turn.started",
            conversation_id,
            database_related = turn.database_related,
            "dialogue turn started"
        );
        self.run_rounds(&mut turn).await
    }

    async fn run_followup(
        &self,
        conversation_id: &str,
        pending: PendingFollowup,
    ) -> Result<AgentAnswer, AgentError> {
        let invocation = expand_followup(&pending.invocation);
        info!(
            event_name = "dialogue.followup.accepted",
            conversation_id,
            tool_name = %invocation.name,
            "expanding previous query"
        );

        let outcome = self.tools.invoke(&invocation.name, &invocation.input).await;
        let result = match outcome {
            ToolOutcome::Completed(value) => value.to_string(),
            ToolOutcome::UnknownTool(name) => {
                let answer = format!("Unknown tool: {name}");
                return Ok(self.answer(conversation_id, answer, None, Vec::new()));
            }
            ToolOutcome::Rejected(error) => {
                let answer = format!("Tool execution failed: {error}");
                return Ok(self.answer(conversation_id, answer, None, vec![invocation]));
            }
            ToolOutcome::Failed(reason) => {
                let answer = format!("Tool execution failed: {reason}");
                return Ok(self.answer(conversation_id, answer, None, vec![invocation]));
            }
        };
        self.memory.set_last_tool(conversation_id, invocation.clone()).await;

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_owned(),
            messages: vec![Message::user(followup_summary_request(&invocation, &result))],
            tools: Vec::new(),
        };
        let reply = self.llm.complete(&request).await?;

        self.memory
            .set_pending_followup(conversation_id, PendingFollowup::expand(invocation.clone()))
            .await;
        Ok(self.answer(conversation_id, reply.text(), Some(reply.usage), vec![invocation]))
    }

    async fn run_rounds(&self, turn: &mut Turn<'_>) -> Result<AgentAnswer, AgentError> {
        let catalogue = self.tools.catalogue();
        let mut last_reply: Option<CompletionReply> = None;

        for round in 1..=self.policy.max_tool_rounds {
            let request = CompletionRequest {
                system: SYSTEM_PROMPT.to_owned(),
                messages: turn.messages.clone(),
                tools: catalogue.clone(),
            };
            let reply = self.llm.complete(&request).await?;

            if !reply.has_tool_use() {
                let tool_called = !turn.collected.is_empty();
                if turn.database_related && !tool_called {
                    if turn.soft_retries < self.policy.max_soft_retries {
                        turn.soft_retries += 1;
                        warn!(
                            event_name = "dialogue.soft_retry",
                            conversation_id = turn.conversation_id,
                            round,
                            retry = turn.soft_retries,
                            "reply without a tool call for a database question"
                        );
                        turn.messages.push(Message::assistant(reply.content.clone()));
                        turn.messages.push(Message::user(TOOL_REQUIRED_NUDGE));
                        continue;
                    }
                    warn!(
                        event_name = "dialogue.refused",
                        conversation_id = turn.conversation_id,
                        round,
                        "no tool call produced after retries"
                    );
                    return Ok(self.answer(
                        turn.conversation_id,
                        NO_TOOL_REFUSAL.to_owned(),
                        Some(reply.usage),
                        Vec::new(),
                    ));
                }

                self.arm_followup(turn).await;
                info!(
                    event_name = "dialogue.turn.answered",
                    conversation_id = turn.conversation_id,
                    round,
                    tool_calls = turn.collected.len(),
                    "dialogue turn answered"
                );
                let collected = std::mem::take(&mut turn.collected);
                return Ok(self.answer(
                    turn.conversation_id,
                    reply.text(),
                    Some(reply.usage),
                    collected,
                ));
            }

            turn.messages.push(Message::assistant(reply.content.clone()));
            let mut results = Vec::new();
            for call in reply.tool_calls() {
                let reconciled = self.guardrails.reconcile(&call.name, &call.input, turn.prompt);
                let invocation = ToolInvocation::new(call.name.clone(), reconciled.input);
                turn.collected.push(invocation.clone());

                let outcome = self.tools.invoke(&invocation.name, &invocation.input).await;
                debug!(
                    event_name = "dialogue.tool.executed",
                    conversation_id = turn.conversation_id,
                    round,
                    tool_name = %invocation.name,
                    is_error = outcome.is_error(),
                    "tool call executed"
                );
                if !matches!(outcome, ToolOutcome::UnknownTool(_)) {
                    self.memory.set_last_tool(turn.conversation_id, invocation).await;
                }
                results.push(outcome.to_block(&call.id));
            }
            turn.messages.push(Message::tool_results(results));
            last_reply = Some(reply);
        }

        warn!(
            event_name = "dialogue.rounds_exhausted",
            conversation_id = turn.conversation_id,
            rounds = self.policy.max_tool_rounds,
            "round budget exhausted"
        );
        self.arm_followup(turn).await;
        let text = last_reply.as_ref().map(CompletionReply::text).unwrap_or_default();
        let answer = if text.trim().is_empty() { ROUNDS_EXHAUSTED.to_owned() } else { text };
        let collected = std::mem::take(&mut turn.collected);
        let usage = last_reply.map(|reply| reply.usage);
        Ok(self.answer(turn.conversation_id, answer, usage, collected))
    }

    async fn arm_followup(&self, turn: &Turn<'_>) {
        if let Some(last) = turn.collected.last() {
            self.memory
                .set_pending_followup(turn.conversation_id, PendingFollowup::expand(last.clone()))
                .await;
        }
    }

    fn answer(
        &self,
        conversation_id: &str,
        answer: String,
        usage: Option<Usage>,
        tool_calls: Vec<ToolInvocation>,
    ) -> AgentAnswer {
        AgentAnswer {
            answer,
            model: self.llm.model().to_owned(),
            usage,
            tool_calls,
            conversation_id: conversation_id.to_owned(),
        }
    }
}

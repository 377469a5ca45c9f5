use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use joblab_core::config::MemoryConfig;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// A tool call as it was actually executed, after guardrail reconciliation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub input: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self { name: name.into(), input }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowupKind {
    ExpandPreviousQuery,
}

/// An offer of deeper analysis awaiting a yes/no on the next turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingFollowup {
    pub kind: FollowupKind,
    pub invocation: ToolInvocation,
}

impl PendingFollowup {
    pub fn expand(invocation: ToolInvocation) -> Self {
        Self { kind: FollowupKind::ExpandPreviousQuery, invocation }
    }
}

/// Per-conversation dialogue state. Each method is an independent get or
/// set; overlapping requests on one key resolve last-write-wins.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    async fn last_tool(&self, conversation_id: &str) -> Option<ToolInvocation>;

    async fn set_last_tool(&self, conversation_id: &str, invocation: ToolInvocation);

    async fn pending_followup(&self, conversation_id: &str) -> Option<PendingFollowup>;

    async fn set_pending_followup(&self, conversation_id: &str, followup: PendingFollowup);

    async fn clear_pending_followup(&self, conversation_id: &str);
}

#[derive(Debug)]
struct ConversationState {
    last_tool: Option<ToolInvocation>,
    pending_followup: Option<PendingFollowup>,
    touched_at: Instant,
}

impl ConversationState {
    fn new() -> Self {
        Self { last_tool: None, pending_followup: None, touched_at: Instant::now() }
    }
}

/// Process-local memory bounded by conversation count and idle TTL.
pub struct InMemoryConversationMemory {
    conversations: RwLock<HashMap<String, ConversationState>>,
    max_conversations: usize,
    ttl: Duration,
}

impl InMemoryConversationMemory {
    pub fn new(max_conversations: usize, ttl: Duration) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            max_conversations: max_conversations.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_conversations, Duration::from_secs(config.ttl_secs))
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn is_expired(&self, state: &ConversationState, now: Instant) -> bool {
        now.duration_since(state.touched_at) > self.ttl
    }

    async fn read<T>(
        &self,
        conversation_id: &str,
        project: impl FnOnce(&ConversationState) -> Option<T>,
    ) -> Option<T> {
        let conversations = self.conversations.read().await;
        let state = conversations.get(conversation_id)?;
        if self.is_expired(state, Instant::now()) {
            return None;
        }
        project(state)
    }

    /// Expired entries are swept only when a new conversation is admitted;
    /// an expired entry that is written again starts from a clean state.
    async fn write(&self, conversation_id: &str, update: impl FnOnce(&mut ConversationState)) {
        let now = Instant::now();
        let mut conversations = self.conversations.write().await;

        if let Some(state) = conversations.get_mut(conversation_id) {
            if self.is_expired(state, now) {
                *state = ConversationState::new();
            }
            state.touched_at = now;
            update(state);
            return;
        }

        self.admit(&mut conversations, now);
        let mut state = ConversationState::new();
        state.touched_at = now;
        update(&mut state);
        conversations.insert(conversation_id.to_owned(), state);
    }

    fn admit(&self, conversations: &mut HashMap<String, ConversationState>, now: Instant) {
        let before = conversations.len();
        conversations.retain(|_, state| !self.is_expired(state, now));
        let expired = before - conversations.len();
        if expired > 0 {
            debug!(event_name = "memory.expired", expired, "expired idle conversations");
        }

        if conversations.len() < self.max_conversations {
            return;
        }
        let oldest = conversations
            .iter()
            .min_by_key(|(_, state)| state.touched_at)
            .map(|(key, _)| key.clone());
        if let Some(oldest) = oldest {
            conversations.remove(&oldest);
            debug!(
                event_name = "memory.evicted",
                conversation_id = %oldest,
                "evicted least recently used conversation"
            );
        }
    }
}

#[async_trait]
impl ConversationMemory for InMemoryConversationMemory {
    async fn last_tool(&self, conversation_id: &str) -> Option<ToolInvocation> {
        self.read(conversation_id, |state| state.last_tool.clone()).await
    }

    async fn set_last_tool(&self, conversation_id: &str, invocation: ToolInvocation) {
        self.write(conversation_id, |state| state.last_tool = Some(invocation)).await;
    }

    async fn pending_followup(&self, conversation_id: &str) -> Option<PendingFollowup> {
        self.read(conversation_id, |state| state.pending_followup.clone()).await
    }

    async fn set_pending_followup(&self, conversation_id: &str, followup: PendingFollowup) {
        self.write(conversation_id, |state| state.pending_followup = Some(followup)).await;
    }

    async fn clear_pending_followup(&self, conversation_id: &str) {
        self.write(conversation_id, |state| state.pending_followup = None).await;
    }
}

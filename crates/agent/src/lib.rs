//! Conversational analytics over the jobs dataset.
//!
//! A user turn flows through:
//! 1. **Follow-up resolution** (`runtime`, `conversation`) - a pending offer
//!    is accepted or declined by a short yes/no reply.
//! 2. **Round loop** (`runtime`) - the completion service is called with the
//!    tool catalogue until it answers in text or the round budget runs out.
//! 3. **Guardrails** (`guardrails`) - unset filters are filled from explicit
//!    wording in the user's prompt before a call executes.
//! 4. **Tools** (`tools`) - a closed set of data-store queries with typed
//!    outcomes; failures become tool results, never aborts.
//!
//! `cv_match` is the separate CV-to-job ranking pipeline.
//!
//! The model only chooses which whitelisted query to run. Numbers in an
//! answer come from tool output.

pub mod conversation;
pub mod cv_match;
pub mod embeddings;
pub mod guardrails;
pub mod llm;
pub mod memory;
pub mod runtime;
pub mod tools;

pub use cv_match::{CvMatchResult, CvMatcher, MatchError};
pub use embeddings::{Embedder, EmbeddingError, HttpEmbedder};
pub use llm::{AnthropicClient, CompletionClient, LlmError};
pub use memory::{ConversationMemory, InMemoryConversationMemory};
pub use runtime::{AgentAnswer, AgentError, AgentRuntime, DialoguePolicy};
pub use tools::ToolRouter;

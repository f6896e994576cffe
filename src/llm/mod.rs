//! The two LLM transport shapes required by §6: a streaming, tool-using
//! "agent mode" and a single-turn, tool-free "analysis mode". Both are
//! traits so the concrete `reqwest`-backed adapter and a test double can
//! satisfy the same contract; grounded on the teacher's
//! `server/services/deepseek/service.rs` (`ClientBuilder` + timeout) and
//! `streaming.rs` (delta/tool-call stream shape).

mod reqwest_client;

pub use reqwest_client::ReqwestLlmClient;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// One chunk of an agent-mode stream.
#[derive(Debug, Clone)]
pub enum AgentMessage {
    Text(String),
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
    Done { stop_reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct AgentTurnUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub cost_usd: f64,
}

/// Streaming request/response with tool invocations (§6). One call per
/// session; the caller reads the stream message-by-message, checking
/// `cancel` between reads so the Agent Runner never blocks indefinitely.
#[async_trait]
pub trait AgentLlmClient: Send + Sync {
    async fn stream_turn(
        &self,
        system_prompt: &str,
        model: &str,
        conversation: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<(Vec<AgentMessage>, AgentTurnUsage)>;
}

/// Single-turn, no tools, plain text out (§6). Callers parse the text
/// (expected JSON) defensively — see `quality::deep_review`.
#[async_trait]
pub trait AnalysisLlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, model: &str, user_prompt: &str) -> Result<String>;
}

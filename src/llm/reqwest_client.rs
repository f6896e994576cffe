use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::{OrchestratorError, Result};

use super::{AgentLlmClient, AgentMessage, AgentTurnUsage, AnalysisLlmClient};

/// The one concrete LLM transport this crate ships, grounded on
/// `server/services/deepseek/service.rs`'s `ClientBuilder::new().timeout(...)`
/// construction and `streaming.rs`'s delta/tool-call chunk shape, against any
/// OpenAI-chat-completions-compatible endpoint (the base URL and model
/// identifiers are configuration, not hardcoded to one vendor).
#[derive(Clone)]
pub struct ReqwestLlmClient {
    client: Client,
    base_url: String,
    api_key: Secret<String>,
}

impl ReqwestLlmClient {
    pub fn new(base_url: String, api_key: Secret<String>, timeout: Duration) -> Self {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .expect("failed to build LLM http client");
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    id: Option<String>,
    function: ToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ToolCallFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

#[async_trait]
impl AgentLlmClient for ReqwestLlmClient {
    async fn stream_turn(
        &self,
        system_prompt: &str,
        model: &str,
        conversation: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<(Vec<AgentMessage>, AgentTurnUsage)> {
        let mut messages = vec![json!({"role": "system", "content": system_prompt})];
        for (role, content) in conversation {
            messages.push(json!({"role": role, "content": content}));
        }

        let body = json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut text = String::new();
        let mut tool_calls: Vec<(String, String, String)> = Vec::new();
        let mut usage = AgentTurnUsage::default();
        let mut stop_reason = "stop".to_string();
        let mut buffer = String::new();

        loop {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Interrupted);
            }
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(OrchestratorError::Interrupted),
                next = stream.next() => next,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(idx) = buffer.find('\n') {
                let line = buffer[..idx].trim().to_string();
                buffer.drain(..=idx);
                let Some(data) = line.strip_prefix("data: ") else { continue };
                if data == "[DONE]" {
                    buffer.clear();
                    break;
                }
                let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) else {
                    continue;
                };
                if let Some(u) = parsed.usage {
                    usage.input_tokens = u.prompt_tokens.unwrap_or(usage.input_tokens);
                    usage.output_tokens = u.completion_tokens.unwrap_or(usage.output_tokens);
                    usage.cache_creation_tokens = u.cache_creation_input_tokens;
                    usage.cache_read_tokens = u.cache_read_input_tokens;
                }
                for choice in parsed.choices {
                    if let Some(content) = choice.delta.content {
                        text.push_str(&content);
                    }
                    if let Some(calls) = choice.delta.tool_calls {
                        for call in calls {
                            tool_calls.push((
                                call.id.unwrap_or_default(),
                                call.function.name.unwrap_or_default(),
                                call.function.arguments.unwrap_or_default(),
                            ));
                        }
                    }
                    if let Some(reason) = choice.finish_reason {
                        stop_reason = reason;
                    }
                }
            }
        }

        let mut out = Vec::new();
        if !text.is_empty() {
            out.push(AgentMessage::Text(text));
        }
        for (id, name, arguments) in tool_calls {
            let input = serde_json::from_str(&arguments).unwrap_or(serde_json::Value::Null);
            out.push(AgentMessage::ToolUse { id, name, input });
        }
        out.push(AgentMessage::Done { stop_reason });

        Ok((out, usage))
    }
}

#[derive(Debug, Deserialize)]
struct NonStreamChoice {
    message: NonStreamMessage,
}

#[derive(Debug, Deserialize)]
struct NonStreamMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NonStreamResponse {
    choices: Vec<NonStreamChoice>,
}

#[async_trait]
impl AnalysisLlmClient for ReqwestLlmClient {
    async fn complete(&self, system_prompt: &str, model: &str, user_prompt: &str) -> Result<String> {
        let body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "stream": false,
        });

        let response: NonStreamResponse = self
            .client
            .post(self.chat_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

use super::traits::{ContextTier, Provider, orphaned_tool_result, split_system};
use super::types::{AssistantMessage, ContentBlock, Message, ToolCallRequest, Usage};
use crate::tools::ToolSpec;
use crate::utils::text::truncate_with_ellipsis;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: Option<String>,
    cached_messages_url: String,
    model: String,
    max_tokens: u32,
    thinking_budget: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<InputContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        signature: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicToolDef {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    content: Vec<ResponseContentBlock>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<&str>, model: &str) -> Self {
        Self::with_base_url(api_key, None, model)
    }

    pub fn with_base_url(api_key: Option<&str>, base_url: Option<&str>, model: &str) -> Self {
        let base = base_url
            .map_or(DEFAULT_BASE_URL, |u| u.trim_end_matches('/'))
            .to_string();
        Self {
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string),
            cached_messages_url: format!("{base}/v1/messages"),
            model: model.to_string(),
            max_tokens: 16_000,
            thinking_budget: 0,
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Enable extended thinking. A budget of zero disables it.
    pub fn with_thinking_budget(mut self, budget_tokens: u32) -> Self {
        self.thinking_budget = budget_tokens;
        self
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolSpec]) -> ChatRequest {
        let (system, rest) = split_system(messages);
        let tools = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|tool| AnthropicToolDef {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        input_schema: tool.parameters.clone(),
                    })
                    .collect(),
            )
        };
        let thinking = (self.thinking_budget > 0).then_some(ThinkingConfig {
            kind: "enabled",
            budget_tokens: self.thinking_budget,
        });

        ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system,
            messages: to_wire_messages(&rest),
            tools,
            thinking,
        }
    }

    fn parse_response(response: ChatResponse) -> AssistantMessage {
        let mut content = Vec::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            match block {
                ResponseContentBlock::Text { text } => content.push(ContentBlock::Text { text }),
                ResponseContentBlock::Thinking {
                    thinking,
                    signature,
                } => content.push(ContentBlock::Reasoning {
                    text: thinking,
                    signature,
                }),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCallRequest::new(id, name, input));
                }
                ResponseContentBlock::Unsupported => {}
            }
        }
        let usage = response.usage.map_or_else(Usage::default, |u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        });
        AssistantMessage {
            content,
            tool_calls,
            usage,
        }
    }

    async fn call_api(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("Anthropic credentials not set. Set ANTHROPIC_API_KEY or api_key in config.")
        })?;

        let response = self
            .client
            .post(&self.cached_messages_url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .header("x-api-key", api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Anthropic API error ({status}): {}",
                truncate_with_ellipsis(&body, 500)
            );
        }

        response.json().await.map_err(anyhow::Error::msg)
    }
}

/// Map history to Anthropic's alternating turns. Consecutive tool results are
/// folded into a single user turn, in order. A result whose `tool_use` is not
/// earlier in the history is sent as user text, since the API rejects a
/// `tool_result` without its call.
fn to_wire_messages(messages: &[&Message]) -> Vec<WireMessage> {
    let mut wire: Vec<WireMessage> = Vec::with_capacity(messages.len());
    let mut known_calls: HashSet<&str> = HashSet::new();
    for message in messages {
        match message {
            Message::System { .. } => {}
            Message::User { content } => wire.push(WireMessage {
                role: "user",
                content: vec![InputContentBlock::Text {
                    text: content.clone(),
                }],
            }),
            Message::Assistant(assistant) => {
                let mut blocks = Vec::new();
                for block in &assistant.content {
                    match block {
                        ContentBlock::Reasoning {
                            text,
                            signature: Some(signature),
                        } => blocks.push(InputContentBlock::Thinking {
                            thinking: text.clone(),
                            signature: signature.clone(),
                        }),
                        // Unsigned reasoning cannot be replayed.
                        ContentBlock::Reasoning {
                            signature: None, ..
                        } => {}
                        ContentBlock::Text { text } if !text.is_empty() => {
                            blocks.push(InputContentBlock::Text { text: text.clone() });
                        }
                        ContentBlock::Text { .. } => {}
                    }
                }
                for call in &assistant.tool_calls {
                    known_calls.insert(call.id.as_str());
                    blocks.push(InputContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: serde_json::Value::Object(call.arguments.clone()),
                    });
                }
                wire.push(WireMessage {
                    role: "assistant",
                    content: blocks,
                });
            }
            Message::ToolResult {
                tool_call_id,
                content,
            } if !known_calls.contains(tool_call_id.as_str()) => {
                let block = InputContentBlock::Text {
                    text: orphaned_tool_result(tool_call_id, content),
                };
                match wire.last_mut() {
                    Some(last) if last.role == "user" => last.content.push(block),
                    _ => wire.push(WireMessage {
                        role: "user",
                        content: vec![block],
                    }),
                }
            }
            Message::ToolResult {
                tool_call_id,
                content,
            } => {
                let block = InputContentBlock::ToolResult {
                    tool_use_id: tool_call_id.clone(),
                    content: content.clone(),
                };
                let previous_is_results = wire.last().is_some_and(|last| {
                    last.role == "user"
                        && last
                            .content
                            .iter()
                            .all(|b| matches!(b, InputContentBlock::ToolResult { .. }))
                });
                match wire.last_mut() {
                    Some(last) if previous_is_results => last.content.push(block),
                    _ => wire.push(WireMessage {
                        role: "user",
                        content: vec![block],
                    }),
                }
            }
        }
    }
    wire
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn context_tier(&self) -> ContextTier {
        ContextTier::Standard
    }

    fn invoke<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<AssistantMessage>> + Send + 'a>> {
        Box::pin(async move {
            let request = self.build_request(messages, tools);
            let response = self.call_api(&request).await?;
            Ok(Self::parse_response(response))
        })
    }
}

//! Google Gemini `generateContent` client.
//!
//! Thought parts (`thought: true`) are surfaced as reasoning blocks; function
//! calls become tool-call requests. Gemini does not always assign call ids, so
//! missing ids are synthesized and mapped back to function names when results
//! are replayed. Results whose call is no longer in the history go out as
//! user text.

use super::traits::{ContextTier, Provider, orphaned_tool_result, split_system};
use super::types::{AssistantMessage, ContentBlock, Message, ToolCallRequest, Usage};
use crate::tools::ToolSpec;
use crate::utils::text::truncate_with_ellipsis;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    thinking_budget: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
    include_thoughts: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GeminiProvider {
    pub fn new(api_key: Option<&str>, model: &str) -> Self {
        Self::with_base_url(api_key, None, model)
    }

    pub fn with_base_url(api_key: Option<&str>, base_url: Option<&str>, model: &str) -> Self {
        Self {
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string),
            base_url: base_url
                .map_or(DEFAULT_BASE_URL, |u| u.trim_end_matches('/'))
                .to_string(),
            model: model.to_string(),
            max_output_tokens: 16_000,
            thinking_budget: 0,
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn with_max_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_thinking_budget(mut self, budget_tokens: u32) -> Self {
        self.thinking_budget = budget_tokens;
        self
    }

    fn endpoint(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolSpec]) -> GenerateContentRequest {
        let (system, rest) = split_system(messages);
        let tools = (!tools.is_empty()).then(|| {
            vec![GeminiTool {
                function_declarations: tools
                    .iter()
                    .map(|tool| FunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    })
                    .collect(),
            }]
        });
        let thinking_config = (self.thinking_budget > 0).then_some(ThinkingConfig {
            thinking_budget: self.thinking_budget,
            include_thoughts: true,
        });

        GenerateContentRequest {
            contents: to_contents(&rest),
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part::text(text)],
            }),
            tools,
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                thinking_config,
            },
        }
    }

    fn parse_response(response: GenerateContentResponse) -> AssistantMessage {
        let mut content = Vec::new();
        let mut tool_calls = Vec::new();
        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|c| c.parts)
            .unwrap_or_default();

        for part in parts {
            if let Some(call) = part.function_call {
                let id = call
                    .id
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                tool_calls.push(ToolCallRequest::new(id, call.name, call.args));
            } else if let Some(text) = part.text {
                if part.thought {
                    content.push(ContentBlock::Reasoning {
                        text,
                        signature: part.thought_signature,
                    });
                } else {
                    content.push(ContentBlock::Text { text });
                }
            }
        }

        let usage = response.usage_metadata.map_or_else(Usage::default, |u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });
        AssistantMessage {
            content,
            tool_calls,
            usage,
        }
    }

    async fn call_api(
        &self,
        request: &GenerateContentRequest,
    ) -> anyhow::Result<GenerateContentResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("Gemini API key not found. Set GOOGLE_API_KEY or api_key in config.")
        })?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Gemini API error ({status}): {}",
                truncate_with_ellipsis(&body, 500)
            );
        }

        response.json().await.map_err(anyhow::Error::msg)
    }
}

fn to_contents(messages: &[&Message]) -> Vec<Content> {
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    let mut contents: Vec<Content> = Vec::with_capacity(messages.len());

    for message in messages {
        match message {
            Message::System { .. } => {}
            Message::User { content } => contents.push(Content {
                role: Some("user".into()),
                parts: vec![Part::text(content.clone())],
            }),
            Message::Assistant(assistant) => {
                let mut parts = Vec::new();
                for block in &assistant.content {
                    match block {
                        ContentBlock::Text { text } if !text.is_empty() => {
                            parts.push(Part::text(text.clone()));
                        }
                        ContentBlock::Text { .. } => {}
                        ContentBlock::Reasoning { text, signature } => parts.push(Part {
                            text: Some(text.clone()),
                            thought: true,
                            thought_signature: signature.clone(),
                            ..Part::default()
                        }),
                    }
                }
                for call in &assistant.tool_calls {
                    call_names.insert(call.id.as_str(), call.name.as_str());
                    parts.push(Part {
                        function_call: Some(FunctionCall {
                            id: Some(call.id.clone()),
                            name: call.name.clone(),
                            args: Value::Object(call.arguments.clone()),
                        }),
                        ..Part::default()
                    });
                }
                contents.push(Content {
                    role: Some("model".into()),
                    parts,
                });
            }
            Message::ToolResult {
                tool_call_id,
                content,
            } => {
                let Some(name) = call_names.get(tool_call_id.as_str()).copied() else {
                    let part = Part::text(orphaned_tool_result(tool_call_id, content));
                    match contents.last_mut() {
                        Some(last) if last.role.as_deref() == Some("user") => {
                            last.parts.push(part);
                        }
                        _ => contents.push(Content {
                            role: Some("user".into()),
                            parts: vec![part],
                        }),
                    }
                    continue;
                };
                let part = Part {
                    function_response: Some(FunctionResponse {
                        id: Some(tool_call_id.clone()),
                        name: name.to_string(),
                        response: json!({ "content": content }),
                    }),
                    ..Part::default()
                };
                match contents.last_mut() {
                    Some(last)
                        if last.role.as_deref() == Some("user")
                            && last.parts.iter().all(|p| p.function_response.is_some()) =>
                    {
                        last.parts.push(part);
                    }
                    _ => contents.push(Content {
                        role: Some("user".into()),
                        parts: vec![part],
                    }),
                }
            }
        }
    }
    contents
}

impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn context_tier(&self) -> ContextTier {
        ContextTier::Extended
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

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(Some("key"), "gemini-test")
    }

    #[test]
    fn endpoint_strips_models_prefix() {
        let p = GeminiProvider::new(Some("k"), "models/gemini-2.5-pro");
        assert_eq!(
            p.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn function_responses_carry_the_call_name() {
        let assistant = AssistantMessage::default().with_tool_calls(vec![ToolCallRequest::new(
            "a",
            "grep_search",
            json!({"pattern": "x"}),
        )]);
        let messages = vec![
            Message::user("find x"),
            Message::from(assistant),
            Message::tool_result("a", "3 matches"),
        ];
        let request = provider().build_request(&messages, &[]);
        assert_eq!(request.contents.len(), 3);
        let value = serde_json::to_value(&request.contents[2]).unwrap();
        assert_eq!(value["parts"][0]["functionResponse"]["name"], "grep_search");
        assert_eq!(
            value["parts"][0]["functionResponse"]["response"]["content"],
            "3 matches"
        );
    }

    #[test]
    fn function_response_without_its_call_becomes_user_text() {
        let messages = vec![
            Message::system("[CONVERSATION SUMMARY - Previous 7 messages]"),
            Message::tool_result("c3", "ok"),
            Message::user("next"),
        ];
        let request = provider().build_request(&messages, &[]);
        assert_eq!(request.contents.len(), 2);
        let value = serde_json::to_value(&request.contents[0]).unwrap();
        assert_eq!(
            value,
            json!({"role": "user", "parts": [{"text": "[Result of earlier tool call c3]\nok"}]})
        );
        assert!(
            request
                .contents
                .iter()
                .flat_map(|c| &c.parts)
                .all(|p| p.function_response.is_none())
        );
    }

    #[test]
    fn parse_response_separates_thoughts_and_calls() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "considering", "thought": true},
                        {"text": "Here you go"},
                        {"functionCall": {"name": "read_file", "args": {"file_path": "a.rs"}}}
                    ]
                }
            }],
            "usageMetadata": {"promptTokenCount": 900, "candidatesTokenCount": 12}
        }))
        .unwrap();
        let message = GeminiProvider::parse_response(response);
        assert!(matches!(message.content[0], ContentBlock::Reasoning { .. }));
        assert_eq!(message.text(), "Here you go");
        assert_eq!(message.tool_calls.len(), 1);
        assert!(message.tool_calls[0].id.starts_with("call_"));
        assert_eq!(message.usage.input_tokens, 900);
    }

    #[test]
    fn reports_extended_tier() {
        assert_eq!(provider().context_tier(), ContextTier::Extended);
        assert_eq!(provider().max_context_tokens(), 1_000_000);
    }
}

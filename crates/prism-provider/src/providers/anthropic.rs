//! Anthropic Claude client.
//!
//! Implements [`ApiClient`] for Anthropic's Messages API with SSE streaming.

use crate::capability::{Capability, CapabilitySet, ClientKind};
use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::http::{self, SdkHandle};
use crate::result::run_cancellable;
use crate::tokens::estimate_value_tokens;
use crate::tools::{parse_arguments, ExternalTool, ToolCallResponse, ToolCallStatus, ToolExecutionResult};
use crate::traits::{
    ApiClient, AssistantOutput, CompletionOptions, RequestTransformer, ResponseChunkTransformer,
    SdkMessage, SdkOutput, SdkTool, SdkToolCall, TransformContext,
};
use crate::types::{
    CompletionRequest, ModelInfo, Model, Provider, ProviderContent, ProviderMessage, Response,
    StopReason, Usage,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const ANTHROPIC_API_HOST: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: usize = 16_384;

/// Anthropic Claude client.
pub struct AnthropicClient {
    provider: Provider,
    sdk: SdkHandle,
}

impl AnthropicClient {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            sdk: SdkHandle::new(),
        }
    }

    fn sdk(&self) -> Result<&reqwest::Client, ProviderError> {
        self.sdk.get(|| self.default_headers())
    }

    async fn complete_buffered(&self, body: Value) -> Result<SdkOutput, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url());
        let raw = http::send_json(self.sdk()?.post(&url).json(&body)).await?;
        let response = parse_response(&raw)?;
        Ok(SdkOutput::Buffered { raw, response })
    }

    async fn complete_streaming(&self, body: Value, model: &str) -> Result<SdkOutput, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url());
        let es = http::open_event_source(self.sdk()?.post(&url).json(&body)).await?;
        let transformer = self.response_chunk_transformer(&TransformContext::new(model))?;
        Ok(SdkOutput::Stream(http::sse_chunks(es, transformer)))
    }
}

#[async_trait]
impl ApiClient for AnthropicClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Anthropic
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::all()
            .without(Capability::Embeddings)
            .without(Capability::ImageGeneration)
    }

    fn base_url(&self) -> String {
        let host = self.provider.api_host.trim().trim_end_matches('/');
        let host = if host.is_empty() { ANTHROPIC_API_HOST } else { host };
        // The client appends `/v1/...` itself
        host.strip_suffix("/v1").unwrap_or(host).to_string()
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if self.provider.has_api_key() {
            http::insert_header(&mut headers, "x-api-key", self.provider.api_key.trim(), true);
        }
        http::insert_header(&mut headers, "anthropic-version", API_VERSION, false);
        headers
    }

    async fn create_completions(
        &self,
        request: CompletionRequest,
        options: CompletionOptions,
    ) -> Result<SdkOutput, ProviderError> {
        let body = build_request_body(&request, request.stream);
        tracing::debug!(
            provider = %self.provider.id,
            model = %request.model,
            stream = request.stream,
            key = %http::redact(&self.provider.api_key),
            "Sending Anthropic messages request"
        );
        let call = async {
            if request.stream {
                self.complete_streaming(body, &request.model).await
            } else {
                self.complete_buffered(body).await
            }
        };
        run_cancellable(options.cancel.as_ref(), call).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/v1/models", self.base_url());
        let raw = http::send_json(self.sdk()?.get(&url)).await?;
        let list: AnthropicModelList = serde_json::from_value(raw)?;
        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                name: m.display_name,
                owned_by: Some("anthropic".to_string()),
            })
            .collect())
    }

    fn request_transformer(&self) -> Result<Box<dyn RequestTransformer>, ProviderError> {
        Ok(Box::new(AnthropicRequestTransformer))
    }

    fn response_chunk_transformer(
        &self,
        _ctx: &TransformContext,
    ) -> Result<Box<dyn ResponseChunkTransformer>, ProviderError> {
        Ok(Box::new(AnthropicChunkTransformer::default()))
    }

    fn convert_tools_to_sdk(&self, tools: &[ExternalTool]) -> Result<Vec<SdkTool>, ProviderError> {
        Ok(tools.iter().map(convert_tool).collect())
    }

    fn convert_sdk_tool_call_to_external(
        &self,
        call: &SdkToolCall,
        tools: &[ExternalTool],
    ) -> Result<Option<ExternalTool>, ProviderError> {
        let name = call["name"].as_str().unwrap_or_default();
        Ok(tools.iter().find(|t| t.matches(name)).cloned())
    }

    fn convert_sdk_tool_call_to_response(
        &self,
        call: &SdkToolCall,
        tool: &ExternalTool,
    ) -> Result<ToolCallResponse, ProviderError> {
        let id = call["id"]
            .as_str()
            .ok_or_else(|| ProviderError::InvalidRequest("tool_use block has no id".to_string()))?;
        Ok(ToolCallResponse {
            id: id.to_string(),
            tool: tool.clone(),
            arguments: call.get("input").cloned().unwrap_or_else(|| json!({})),
            status: ToolCallStatus::Pending,
        })
    }

    fn convert_tool_result_to_sdk_message(
        &self,
        response: &ToolCallResponse,
        result: &ToolExecutionResult,
        _model: &Model,
    ) -> Result<Option<SdkMessage>, ProviderError> {
        Ok(Some(json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": response.id,
                "content": result.joined_text(),
                "is_error": result.is_error,
            }],
        })))
    }

    fn build_sdk_messages(
        &self,
        existing: &[SdkMessage],
        output: &AssistantOutput,
        tool_results: &[SdkMessage],
        tool_calls: &[SdkToolCall],
    ) -> Result<Vec<SdkMessage>, ProviderError> {
        Ok(build_messages(existing, output, tool_results, tool_calls))
    }

    fn extract_messages_from_payload(&self, payload: &Value) -> Result<Vec<SdkMessage>, ProviderError> {
        Ok(payload["messages"].as_array().cloned().unwrap_or_default())
    }

    fn estimate_message_tokens(&self, message: &SdkMessage) -> Result<usize, ProviderError> {
        Ok(estimate_value_tokens(&message["content"]))
    }
}

// ── Wire helpers ──

/// Convert an internal request into the Anthropic API request body.
pub(crate) fn build_request_body(request: &CompletionRequest, stream: bool) -> Value {
    let messages: Vec<Value> = request.messages.iter().filter_map(convert_message).collect();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "stream": stream,
    });

    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools.iter().map(convert_tool).collect::<Vec<_>>());
    }

    if let Some(ref system) = request.system {
        body["system"] = json!(system);
    }

    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    if let Some(ref thinking) = request.thinking {
        if thinking.enabled {
            body["thinking"] = json!({
                "type": "enabled",
                "budget_tokens": thinking.budget_tokens,
            });
        }
    }

    body
}

/// Convert a ProviderMessage to the Anthropic JSON format.
fn convert_message(msg: &ProviderMessage) -> Option<Value> {
    // Anthropic only accepts "user" and "assistant" roles in messages
    let role = match msg.role.as_str() {
        "user" | "assistant" => msg.role.as_str(),
        "tool" => "user",
        _ => return None, // System is handled separately
    };

    let content: Vec<Value> = msg.content.iter().map(convert_content).collect();

    if content.is_empty() {
        return None;
    }

    Some(json!({
        "role": role,
        "content": content,
    }))
}

/// Convert a ProviderContent block to Anthropic format.
fn convert_content(content: &ProviderContent) -> Value {
    match content {
        ProviderContent::Text { text } => json!({
            "type": "text",
            "text": text,
        }),
        ProviderContent::ToolCall {
            id,
            name,
            arguments,
        } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": arguments,
        }),
        ProviderContent::ToolResult {
            tool_call_id,
            content,
            is_error,
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_call_id,
            "content": content,
            "is_error": is_error,
        }),
        ProviderContent::Image { data, mime_type } => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": mime_type,
                "data": data,
            },
        }),
    }
}

fn convert_tool(tool: &ExternalTool) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn build_messages(
    existing: &[SdkMessage],
    output: &AssistantOutput,
    tool_results: &[SdkMessage],
    tool_calls: &[SdkToolCall],
) -> Vec<SdkMessage> {
    let mut messages = existing.to_vec();

    let content = match output {
        AssistantOutput::Raw(raw) => raw["content"].as_array().cloned().unwrap_or_default(),
        AssistantOutput::Text(text) => {
            let mut blocks = Vec::new();
            if !text.is_empty() {
                blocks.push(json!({"type": "text", "text": text}));
            }
            blocks.extend(tool_calls.iter().cloned());
            blocks
        }
    };
    if !content.is_empty() {
        messages.push(json!({"role": "assistant", "content": content}));
    }

    // Results for one turn go back together in a single user message
    let results: Vec<Value> = tool_results
        .iter()
        .flat_map(|m| m["content"].as_array().cloned().unwrap_or_default())
        .collect();
    if !results.is_empty() {
        messages.push(json!({"role": "user", "content": results}));
    }

    messages
}

fn parse_stop_reason(reason: &str) -> StopReason {
    match reason {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

/// Parse a buffered Messages response.
pub(crate) fn parse_response(raw: &Value) -> Result<Response, ProviderError> {
    let resp: AnthropicResponse = serde_json::from_value(raw.clone())?;
    let content = resp
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(ProviderContent::Text { text }),
            ResponseBlock::ToolUse { id, name, input } => Some(ProviderContent::ToolCall {
                id,
                name,
                arguments: input,
            }),
            ResponseBlock::Other => None,
        })
        .collect();

    Ok(Response {
        content,
        stop_reason: resp
            .stop_reason
            .as_deref()
            .map(parse_stop_reason)
            .unwrap_or(StopReason::EndTurn),
        usage: Usage {
            input_tokens: resp.usage.input_tokens.unwrap_or(0),
            output_tokens: resp.usage.output_tokens.unwrap_or(0),
        },
    })
}

struct AnthropicRequestTransformer;

impl RequestTransformer for AnthropicRequestTransformer {
    fn transform(&self, request: &CompletionRequest) -> Result<Value, ProviderError> {
        Ok(build_request_body(request, request.stream))
    }
}

#[derive(Debug, Default)]
struct PendingToolUse {
    id: String,
    name: String,
    json: String,
}

/// Stream state for Messages API events.
///
/// `input_json_delta` fragments are tracked per content block index and the
/// complete call is emitted on `content_block_stop`.
#[derive(Debug, Default)]
pub(crate) struct AnthropicChunkTransformer {
    tool_blocks: BTreeMap<usize, PendingToolUse>,
    usage: Usage,
    stop: Option<StopReason>,
    done: bool,
}

impl AnthropicChunkTransformer {
    fn handle(&mut self, event: AnthropicEvent) -> Result<Vec<Chunk>, ProviderError> {
        let chunks = match event {
            AnthropicEvent::ContentBlockDelta { delta, index } => match delta {
                Delta::Text { text } => vec![Chunk::text(text)],
                Delta::Thinking { thinking } => vec![Chunk::ThinkingDelta { text: thinking }],
                Delta::InputJson { partial_json } => {
                    if let Some(block) = self.tool_blocks.get_mut(&index) {
                        block.json.push_str(&partial_json);
                    }
                    vec![]
                }
                Delta::Other => vec![],
            },
            AnthropicEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                if let ContentBlockInfo::ToolUse { id, name } = content_block {
                    self.tool_blocks.insert(
                        index,
                        PendingToolUse {
                            id,
                            name,
                            json: String::new(),
                        },
                    );
                }
                vec![]
            }
            AnthropicEvent::ContentBlockStop { index } => match self.tool_blocks.remove(&index) {
                Some(block) => vec![Chunk::ToolCall {
                    id: block.id,
                    name: block.name,
                    arguments: parse_arguments(&block.json),
                }],
                None => vec![],
            },
            AnthropicEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.usage.input_tokens = usage.input_tokens.unwrap_or(0);
                    self.usage.output_tokens = usage.output_tokens.unwrap_or(0);
                }
                vec![]
            }
            AnthropicEvent::MessageDelta { delta, usage } => {
                let mut chunks = Vec::new();
                if let Some(usage) = usage {
                    if let Some(input) = usage.input_tokens {
                        self.usage.input_tokens = input;
                    }
                    if let Some(output) = usage.output_tokens {
                        self.usage.output_tokens = output;
                    }
                    chunks.push(Chunk::Usage {
                        usage: self.usage.clone(),
                    });
                }
                if let Some(reason) = delta.stop_reason {
                    self.stop = Some(parse_stop_reason(&reason));
                }
                chunks
            }
            AnthropicEvent::MessageStop => self.finish(),
            AnthropicEvent::Ping => vec![],
            AnthropicEvent::Error { error } => {
                return Err(http::stream_event_error(&error.error_type, &error.message));
            }
        };
        Ok(chunks)
    }
}

impl ResponseChunkTransformer for AnthropicChunkTransformer {
    fn transform(&mut self, data: &str) -> Result<Vec<Chunk>, ProviderError> {
        if data.trim() == "[DONE]" {
            return Ok(vec![]);
        }
        match serde_json::from_str::<AnthropicEvent>(data) {
            Ok(event) => self.handle(event),
            // Skip event types this client does not know about
            Err(_) => Ok(vec![]),
        }
    }

    fn finish(&mut self) -> Vec<Chunk> {
        let reason = self.stop.take().unwrap_or(StopReason::EndTurn);
        http::done_once(&mut self.done, reason)
    }
}

// ──────────────────────────────────────────────────────────
// Anthropic wire types (internal)
// ──────────────────────────────────────────────────────────

/// Top-level SSE event from the Anthropic API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageStartData },

    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockInfo,
    },

    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: Delta },

    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: usize },

    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: MessageDeltaData,
        #[serde(default)]
        usage: Option<UsageData>,
    },

    #[serde(rename = "message_stop")]
    MessageStop,

    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "error")]
    Error { error: ErrorData },
}

#[derive(Debug, Deserialize)]
struct MessageStartData {
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlockInfo {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[allow(clippy::enum_variant_names)]
enum Delta {
    #[serde(rename = "text_delta")]
    Text { text: String },

    #[serde(rename = "thinking_delta")]
    Thinking { thinking: String },

    #[serde(rename = "input_json_delta")]
    InputJson { partial_json: String },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaData {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UsageData {
    #[serde(default)]
    input_tokens: Option<usize>,
    #[serde(default)]
    output_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: UsageData,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicModelList {
    #[serde(default)]
    data: Vec<AnthropicModel>,
}

#[derive(Debug, Deserialize)]
struct AnthropicModel {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

// ──────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────

//! Generic OpenAI-compatible client.
//!
//! Handles the OpenAI chat completions API format used by OpenAI, Azure
//! OpenAI, and the many vendors that clone it. Vendor quirks (extra headers,
//! a different image API, merged model lists) are expressed through
//! [`OpenAiCompatConfig`].

use crate::capability::{Capability, CapabilitySet, ClientKind};
use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::http::{self, SdkHandle};
use crate::providers::zhipu;
use crate::result::run_cancellable;
use crate::tokens::estimate_value_tokens;
use crate::tools::{parse_arguments, ExternalTool, ToolCallResponse, ToolCallStatus, ToolExecutionResult};
use crate::traits::{
    ApiClient, AssistantOutput, CompletionOptions, RequestTransformer, ResponseChunkTransformer,
    SdkMessage, SdkOutput, SdkTool, SdkToolCall, TransformContext,
};
use crate::types::{
    CompletionRequest, ImageParams, Model, ModelInfo, Provider, ProviderContent, ProviderType,
    Response, StopReason, Usage,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const DEFAULT_HOST: &str = "https://api.openai.com";
pub const AZURE_API_VERSION: &str = "2024-10-21";

/// Which image-generation wire shape the vendor speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageApi {
    OpenAi,
    Zhipu,
}

/// Configuration for an OpenAI-compatible client.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub kind: ClientKind,
    pub capabilities: CapabilitySet,
    pub image_api: ImageApi,
    /// Sent with every request, after authentication.
    pub extra_headers: Vec<(String, String)>,
    /// Query strings appended to the model listing URL. Results are merged
    /// in order and de-duplicated by id.
    pub model_list_queries: Vec<String>,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            kind: ClientKind::OpenAi,
            capabilities: CapabilitySet::all(),
            image_api: ImageApi::OpenAi,
            extra_headers: Vec::new(),
            model_list_queries: vec![String::new()],
        }
    }
}

/// A client that speaks the OpenAI chat completions protocol.
pub struct OpenAiCompatClient {
    provider: Provider,
    config: OpenAiCompatConfig,
    sdk: SdkHandle,
}

/// Create the plain OpenAI-compatible client.
pub fn new_openai_client(provider: Provider) -> OpenAiCompatClient {
    OpenAiCompatClient::new(provider, OpenAiCompatConfig::default())
}

/// Normalize a configured host into the API root.
///
/// A trailing `#` means "use exactly this", a trailing `/` or an explicit
/// version segment keeps the host as written, anything else gets `/v1`.
pub fn format_api_host(host: &str) -> String {
    let host = host.trim();
    if host.is_empty() {
        return format!("{DEFAULT_HOST}/v1");
    }
    if let Some(exact) = host.strip_suffix('#') {
        return exact.trim_end_matches('/').to_string();
    }
    if host.ends_with('/') {
        return host.trim_end_matches('/').to_string();
    }
    let has_version = host
        .rsplit('/')
        .next()
        .and_then(|last| last.strip_prefix('v'))
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()));
    if has_version {
        host.to_string()
    } else {
        format!("{host}/v1")
    }
}

impl OpenAiCompatClient {
    pub fn new(provider: Provider, config: OpenAiCompatConfig) -> Self {
        Self {
            provider,
            config,
            sdk: SdkHandle::new(),
        }
    }

    pub fn config(&self) -> &OpenAiCompatConfig {
        &self.config
    }

    fn is_azure(&self) -> bool {
        self.provider.kind == ProviderType::AzureOpenAi
    }

    pub(crate) fn sdk(&self) -> Result<&reqwest::Client, ProviderError> {
        self.sdk.get(|| self.default_headers())
    }

    /// URL for an API path such as `/chat/completions`.
    ///
    /// Azure routes model-bound paths through the deployment named after the
    /// model and pins the API version.
    pub(crate) fn endpoint(&self, path: &str, model: Option<&str>) -> String {
        if self.is_azure() {
            let host = self.provider.api_host.trim().trim_end_matches('/');
            return match model {
                Some(model) => format!(
                    "{host}/openai/deployments/{model}{path}?api-version={AZURE_API_VERSION}"
                ),
                None => format!("{host}/openai{path}?api-version={AZURE_API_VERSION}"),
            };
        }
        format!("{}{}", self.base_url(), path)
    }

    async fn complete_buffered(&self, body: Value) -> Result<SdkOutput, ProviderError> {
        let url = self.endpoint("/chat/completions", body["model"].as_str());
        let raw = http::send_json(self.sdk()?.post(&url).json(&body)).await?;
        let response = parse_response(&raw)?;
        Ok(SdkOutput::Buffered { raw, response })
    }

    async fn complete_streaming(&self, body: Value, model: &str) -> Result<SdkOutput, ProviderError> {
        let url = self.endpoint("/chat/completions", Some(model));
        let es = http::open_event_source(self.sdk()?.post(&url).json(&body)).await?;
        let transformer = self.response_chunk_transformer(&TransformContext::new(model))?;
        Ok(SdkOutput::Stream(http::sse_chunks(es, transformer)))
    }

    async fn generate_openai_images(&self, params: &ImageParams) -> Result<Vec<String>, ProviderError> {
        let mut body = json!({
            "model": params.model,
            "prompt": params.prompt,
            "n": params.batch_size,
            "size": params.image_size,
        });
        if let Some(quality) = &params.quality {
            body["quality"] = json!(quality);
        }
        let url = self.endpoint("/images/generations", Some(&params.model));
        let raw = http::send_json(self.sdk()?.post(&url).json(&body)).await?;
        let images: ImagesResponse = serde_json::from_value(raw)?;
        Ok(images
            .data
            .into_iter()
            .filter_map(|image| {
                image
                    .url
                    .or_else(|| image.b64_json.map(|b64| format!("data:image/png;base64,{b64}")))
            })
            .collect())
    }
}

#[async_trait]
impl ApiClient for OpenAiCompatClient {
    fn kind(&self) -> ClientKind {
        self.config.kind
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn capabilities(&self) -> CapabilitySet {
        self.config.capabilities
    }

    fn base_url(&self) -> String {
        format_api_host(&self.provider.api_host)
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = if self.is_azure() {
            let mut headers = HeaderMap::new();
            http::insert_header(&mut headers, "api-key", self.provider.api_key.trim(), true);
            headers
        } else {
            http::bearer_headers(&self.provider.api_key)
        };
        for (name, value) in &self.config.extra_headers {
            let sensitive = name.to_ascii_lowercase().contains("key");
            http::insert_header(&mut headers, name, value, sensitive);
        }
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
            "Sending chat completion"
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
        self.ensure(Capability::ListModels)?;
        let sdk = self.sdk()?;
        let base = self.endpoint("/models", None);
        let mut models: Vec<ModelInfo> = Vec::new();
        for query in &self.config.model_list_queries {
            let url = if query.is_empty() {
                base.clone()
            } else if base.contains('?') {
                format!("{base}&{}", query.trim_start_matches('?'))
            } else {
                format!("{base}?{}", query.trim_start_matches('?'))
            };
            let raw = http::send_json(sdk.get(&url)).await?;
            let list: ModelList = serde_json::from_value(raw)?;
            for model in list.data {
                if !models.iter().any(|m| m.id == model.id) {
                    models.push(ModelInfo {
                        id: model.id,
                        name: None,
                        owned_by: model.owned_by,
                    });
                }
            }
        }
        Ok(models)
    }

    async fn embedding_dimensions(&self, model: &Model) -> Result<usize, ProviderError> {
        self.ensure(Capability::Embeddings)?;
        let url = self.endpoint("/embeddings", Some(&model.id));
        let body = json!({"model": model.id, "input": "hi"});
        let raw = http::send_json(self.sdk()?.post(&url).json(&body)).await?;
        raw["data"][0]["embedding"]
            .as_array()
            .map(Vec::len)
            .ok_or_else(|| ProviderError::StreamError("Embedding response has no vector".to_string()))
    }

    async fn generate_image(&self, params: ImageParams) -> Result<Vec<String>, ProviderError> {
        self.ensure(Capability::ImageGeneration)?;
        let cancel = params.cancel.clone();
        let call = async {
            match self.config.image_api {
                ImageApi::OpenAi => self.generate_openai_images(&params).await,
                ImageApi::Zhipu => {
                    zhipu::generate_images(self.sdk()?, &self.base_url(), &params).await
                }
            }
        };
        run_cancellable(cancel.as_ref(), call).await
    }

    fn request_transformer(&self) -> Result<Box<dyn RequestTransformer>, ProviderError> {
        Ok(Box::new(OpenAiRequestTransformer))
    }

    fn response_chunk_transformer(
        &self,
        _ctx: &TransformContext,
    ) -> Result<Box<dyn ResponseChunkTransformer>, ProviderError> {
        self.ensure(Capability::Streaming)?;
        Ok(Box::new(OpenAiChunkTransformer::default()))
    }

    fn convert_tools_to_sdk(&self, tools: &[ExternalTool]) -> Result<Vec<SdkTool>, ProviderError> {
        Ok(tools.iter().map(tool_to_sdk).collect())
    }

    fn convert_sdk_tool_call_to_external(
        &self,
        call: &SdkToolCall,
        tools: &[ExternalTool],
    ) -> Result<Option<ExternalTool>, ProviderError> {
        let name = call["function"]["name"].as_str().unwrap_or_default();
        Ok(tools.iter().find(|t| t.matches(name)).cloned())
    }

    fn convert_sdk_tool_call_to_response(
        &self,
        call: &SdkToolCall,
        tool: &ExternalTool,
    ) -> Result<ToolCallResponse, ProviderError> {
        tool_call_to_response(call, tool)
    }

    fn convert_tool_result_to_sdk_message(
        &self,
        response: &ToolCallResponse,
        result: &ToolExecutionResult,
        _model: &Model,
    ) -> Result<Option<SdkMessage>, ProviderError> {
        Ok(Some(json!({
            "role": "tool",
            "tool_call_id": response.id,
            "content": result.joined_text(),
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
        Ok(estimate_message(message))
    }
}

// ── Wire helpers shared by every OpenAI-shaped client ──

/// Build the JSON request body.
pub(crate) fn build_request_body(request: &CompletionRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": convert_messages(request),
        "stream": stream,
    });

    if stream {
        body["stream_options"] = json!({"include_usage": true});
    }

    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools.iter().map(tool_to_sdk).collect::<Vec<_>>());
    }

    body
}

fn tool_to_sdk(tool: &ExternalTool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

pub(crate) fn tool_call_to_response(
    call: &SdkToolCall,
    tool: &ExternalTool,
) -> Result<ToolCallResponse, ProviderError> {
    let id = call["id"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidRequest("Tool call has no id".to_string()))?;
    let arguments = match &call["function"]["arguments"] {
        Value::String(raw) => parse_arguments(raw),
        Value::Null => json!({}),
        other => other.clone(),
    };
    Ok(ToolCallResponse {
        id: id.to_string(),
        tool: tool.clone(),
        arguments,
        status: ToolCallStatus::Pending,
    })
}

/// Convert messages to OpenAI format.
fn convert_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut messages = Vec::new();

    if let Some(ref system) = request.system {
        messages.push(json!({"role": "system", "content": system}));
    }

    for msg in &request.messages {
        let role = msg.role.as_str();

        // Tool results travel as role=tool, one message per result
        let has_tool_results = msg
            .content
            .iter()
            .any(|c| matches!(c, ProviderContent::ToolResult { .. }));

        if has_tool_results {
            for block in &msg.content {
                if let ProviderContent::ToolResult {
                    tool_call_id,
                    content,
                    ..
                } = block
                {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_call_id,
                        "content": content,
                    }));
                }
            }
            continue;
        }

        let tool_calls: Vec<Value> = msg
            .content
            .iter()
            .filter_map(|c| match c {
                ProviderContent::ToolCall {
                    id,
                    name,
                    arguments,
                } => Some(json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": arguments.to_string(),
                    }
                })),
                _ => None,
            })
            .collect();

        if !tool_calls.is_empty() && role == "assistant" {
            let mut msg_json = json!({
                "role": "assistant",
                "tool_calls": tool_calls,
            });
            let text = msg.text();
            if !text.is_empty() {
                msg_json["content"] = json!(text);
            }
            messages.push(msg_json);
            continue;
        }

        let has_images = msg
            .content
            .iter()
            .any(|c| matches!(c, ProviderContent::Image { .. }));

        if has_images {
            let parts: Vec<Value> = msg
                .content
                .iter()
                .filter_map(|c| match c {
                    ProviderContent::Text { text } => Some(json!({"type": "text", "text": text})),
                    ProviderContent::Image { data, mime_type } => Some(json!({
                        "type": "image_url",
                        "image_url": {"url": format!("data:{mime_type};base64,{data}")},
                    })),
                    _ => None,
                })
                .collect();
            messages.push(json!({"role": role, "content": parts}));
            continue;
        }

        messages.push(json!({"role": role, "content": msg.text()}));
    }

    messages
}

pub(crate) fn build_messages(
    existing: &[SdkMessage],
    output: &AssistantOutput,
    tool_results: &[SdkMessage],
    tool_calls: &[SdkToolCall],
) -> Vec<SdkMessage> {
    let mut messages = existing.to_vec();

    let assistant = match output {
        AssistantOutput::Raw(raw) => raw["choices"][0]["message"].clone(),
        AssistantOutput::Text(text) => {
            let mut message = json!({"role": "assistant", "content": text});
            if !tool_calls.is_empty() {
                message["tool_calls"] = json!(tool_calls);
            }
            message
        }
    };
    if !assistant.is_null() {
        messages.push(assistant);
    }

    messages.extend(tool_results.iter().cloned());
    messages
}

pub(crate) fn estimate_message(message: &SdkMessage) -> usize {
    estimate_value_tokens(&message["content"]) + estimate_value_tokens(&message["tool_calls"])
}

/// Parse a buffered chat completion.
pub(crate) fn parse_response(raw: &Value) -> Result<Response, ProviderError> {
    let resp: OpenAiResponse = serde_json::from_value(raw.clone())?;

    let choice = resp
        .choices
        .first()
        .ok_or_else(|| ProviderError::StreamError("No choices in response".to_string()))?;

    let mut content = Vec::new();
    if let Some(ref text) = choice.message.content {
        if !text.is_empty() {
            content.push(ProviderContent::Text { text: text.clone() });
        }
    }
    for call in choice.message.tool_calls.iter().flatten() {
        content.push(ProviderContent::ToolCall {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments: parse_arguments(&call.function.arguments),
        });
    }

    Ok(Response {
        content,
        usage: resp.usage.map(Usage::from).unwrap_or_default(),
        stop_reason: stop_reason(choice.finish_reason.as_deref()),
    })
}

fn stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

struct OpenAiRequestTransformer;

impl RequestTransformer for OpenAiRequestTransformer {
    fn transform(&self, request: &CompletionRequest) -> Result<Value, ProviderError> {
        Ok(build_request_body(request, request.stream))
    }
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Stream state for chat completion chunks.
///
/// Tool calls arrive as fragments keyed by `index`; they are flushed as
/// complete calls when the choice finishes.
#[derive(Debug, Default)]
pub(crate) struct OpenAiChunkTransformer {
    tool_calls: BTreeMap<usize, PendingToolCall>,
    stop: Option<StopReason>,
    done: bool,
}

impl OpenAiChunkTransformer {
    fn flush_tool_calls(&mut self) -> Vec<Chunk> {
        std::mem::take(&mut self.tool_calls)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| Chunk::ToolCall {
                id: call.id,
                name: call.name,
                arguments: parse_arguments(&call.arguments),
            })
            .collect()
    }
}

impl ResponseChunkTransformer for OpenAiChunkTransformer {
    fn transform(&mut self, data: &str) -> Result<Vec<Chunk>, ProviderError> {
        if data.trim() == "[DONE]" {
            return Ok(self.finish());
        }

        let chunk: OpenAiChunk = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(_) => return Ok(vec![]),
        };

        if let Some(error) = chunk.error {
            return Err(http::api_error(500, &json!({"error": error}).to_string()));
        }

        let mut chunks = Vec::new();

        for choice in &chunk.choices {
            if let Some(ref reasoning) = choice.delta.reasoning_content {
                if !reasoning.is_empty() {
                    chunks.push(Chunk::ThinkingDelta {
                        text: reasoning.clone(),
                    });
                }
            }

            if let Some(ref content) = choice.delta.content {
                if !content.is_empty() {
                    chunks.push(Chunk::text(content.clone()));
                }
            }

            for tc in choice.delta.tool_calls.iter().flatten() {
                let pending = self.tool_calls.entry(tc.index).or_default();
                if let Some(ref id) = tc.id {
                    pending.id = id.clone();
                }
                if let Some(ref func) = tc.function {
                    if let Some(ref name) = func.name {
                        pending.name.push_str(name);
                    }
                    if let Some(ref args) = func.arguments {
                        pending.arguments.push_str(args);
                    }
                }
            }

            if let Some(ref reason) = choice.finish_reason {
                chunks.extend(self.flush_tool_calls());
                self.stop = Some(stop_reason(Some(reason)));
            }
        }

        if let Some(usage) = chunk.usage {
            chunks.push(Chunk::Usage {
                usage: usage.into(),
            });
        }

        Ok(chunks)
    }

    fn finish(&mut self) -> Vec<Chunk> {
        if self.done {
            return Vec::new();
        }
        let mut chunks = self.flush_tool_calls();
        let reason = self.stop.take().unwrap_or(StopReason::EndTurn);
        chunks.extend(http::done_once(&mut self.done, reason));
        chunks
    }
}

// ── OpenAI response types for deserialization ──

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChunkChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunkChoice {
    #[serde(default)]
    delta: OpenAiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiResponseChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

impl From<OpenAiUsage> for Usage {
    fn from(usage: OpenAiUsage) -> Self {
        Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderMessage;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_provider(host: &str) -> Provider {
        Provider::new("openai", "openai", host).with_api_key("test-key")
    }

    #[test]
    fn test_format_api_host() {
        assert_eq!(format_api_host("https://api.openai.com"), "https://api.openai.com/v1");
        assert_eq!(
            format_api_host("https://open.bigmodel.cn/api/paas/v4/"),
            "https://open.bigmodel.cn/api/paas/v4"
        );
        assert_eq!(format_api_host("https://x.com/api/v3"), "https://x.com/api/v3");
        assert_eq!(format_api_host("https://x.com/custom#"), "https://x.com/custom");
        assert_eq!(format_api_host(""), "https://api.openai.com/v1");
    }

    #[test]
    fn test_azure_endpoint_and_headers() {
        let provider = Provider::new("azure", "azure-openai", "https://res.openai.azure.com/")
            .with_api_key("az-key");
        let client = new_openai_client(provider);
        assert_eq!(
            client.endpoint("/chat/completions", Some("gpt-4o")),
            format!(
                "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version={AZURE_API_VERSION}"
            )
        );
        let headers = client.default_headers();
        assert_eq!(headers["api-key"], "az-key");
        assert!(headers.get("authorization").is_none());
    }

    #[test]
    fn test_build_request_body() {
        let request = CompletionRequest {
            system: Some("Be helpful".to_string()),
            max_tokens: Some(1024),
            ..CompletionRequest::new("gpt-4o", vec![ProviderMessage::user("Hello")])
        };

        let body = build_request_body(&request, true);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 1024);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[1]["role"], "user");
        assert_eq!(msgs[1]["content"], "Hello");
    }

    #[test]
    fn test_build_request_with_tools() {
        let mut request = CompletionRequest::new("gpt-4o", vec![]).buffered();
        request.tools = vec![ExternalTool::new(
            "read",
            "Read a file",
            json!({"type": "object", "properties": {"path": {"type": "string"}}}),
        )];

        let body = build_request_body(&request, false);
        assert!(body.get("stream_options").is_none());
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["function"]["name"], "read");
    }

    #[test]
    fn test_tool_results_become_tool_messages() {
        let request = CompletionRequest::new(
            "m",
            vec![ProviderMessage {
                role: "user".to_string(),
                content: vec![ProviderContent::ToolResult {
                    tool_call_id: "call_1".to_string(),
                    content: "ok".to_string(),
                    is_error: false,
                }],
            }],
        );
        let msgs = convert_messages(&request);
        assert_eq!(msgs[0]["role"], "tool");
        assert_eq!(msgs[0]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_parse_text_delta() {
        let mut t = OpenAiChunkTransformer::default();
        let chunks = t
            .transform(r#"{"choices":[{"delta":{"content":"Hello"},"index":0}]}"#)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        match &chunks[0] {
            Chunk::TextDelta { text } => assert_eq!(text, "Hello"),
            other => panic!("Expected TextDelta, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reasoning_delta() {
        let mut t = OpenAiChunkTransformer::default();
        let chunks = t
            .transform(r#"{"choices":[{"delta":{"reasoning_content":"hmm"},"index":0}]}"#)
            .unwrap();
        assert!(matches!(&chunks[0], Chunk::ThinkingDelta { text } if text == "hmm"));
    }

    #[test]
    fn test_tool_call_fragments_assembled() {
        let mut t = OpenAiChunkTransformer::default();
        let first = t
            .transform(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"read","arguments":""}}]},"index":0}]}"#)
            .unwrap();
        assert!(first.is_empty());
        t.transform(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"path\":"}}]},"index":0}]}"#)
            .unwrap();
        t.transform(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"a.rs\"}"}}]},"index":0}]}"#)
            .unwrap();
        let finished = t
            .transform(r#"{"choices":[{"delta":{},"finish_reason":"tool_calls","index":0}]}"#)
            .unwrap();
        assert_eq!(finished.len(), 1);
        match &finished[0] {
            Chunk::ToolCall {
                id,
                name,
                arguments,
            } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "read");
                assert_eq!(arguments, &json!({"path": "a.rs"}));
            }
            other => panic!("Expected ToolCall, got: {other:?}"),
        }

        let done = t.transform("[DONE]").unwrap();
        assert!(matches!(
            done.as_slice(),
            [Chunk::Done {
                reason: StopReason::ToolUse
            }]
        ));
        assert!(t.finish().is_empty());
    }

    #[test]
    fn test_usage_chunk() {
        let mut t = OpenAiChunkTransformer::default();
        let chunks = t
            .transform(r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7}}"#)
            .unwrap();
        assert!(matches!(
            &chunks[0],
            Chunk::Usage { usage } if usage.input_tokens == 5 && usage.output_tokens == 7
        ));
    }

    #[test]
    fn test_parse_buffered_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": "Hi",
                    "tool_calls": [{"id": "c1", "type": "function", "function": {"name": "read", "arguments": "{}"}}]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 2, "completion_tokens": 3}
        });
        let response = parse_response(&raw).unwrap();
        assert_eq!(response.text(), "Hi");
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.content.len(), 2);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[test]
    fn test_tool_bridging() {
        let client = new_openai_client(test_provider("https://x/"));
        let tool = ExternalTool::new("read", "Read", json!({"type": "object"}));
        let sdk_tools = client.convert_tools_to_sdk(std::slice::from_ref(&tool)).unwrap();
        assert_eq!(sdk_tools[0]["type"], "function");

        let call = json!({"id": "c1", "type": "function", "function": {"name": "read", "arguments": "{\"path\":\"a\"}"}});
        let found = client
            .convert_sdk_tool_call_to_external(&call, std::slice::from_ref(&tool))
            .unwrap()
            .unwrap();
        let response = client.convert_sdk_tool_call_to_response(&call, &found).unwrap();
        assert_eq!(response.arguments, json!({"path": "a"}));

        let message = client
            .convert_tool_result_to_sdk_message(
                &response,
                &ToolExecutionResult::text("done"),
                &Model::new("gpt-4o", "openai"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(message["role"], "tool");
        assert_eq!(message["tool_call_id"], "c1");

        let messages = client
            .build_sdk_messages(
                &[json!({"role": "user", "content": "read a"})],
                &AssistantOutput::Text(String::new()),
                &[message],
                &[call],
            )
            .unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["tool_calls"][0]["id"], "c1");

        let payload = json!({"model": "m", "messages": messages});
        assert_eq!(client.extract_messages_from_payload(&payload).unwrap().len(), 3);
        assert!(client.estimate_message_tokens(&payload["messages"][0]).unwrap() > 0);
    }

    #[tokio::test]
    async fn test_buffered_completion_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "gpt-4o", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "pong"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1}
            })))
            .mount(&server)
            .await;

        let client = new_openai_client(test_provider(&server.uri()));
        let request = CompletionRequest::new("gpt-4o", vec![ProviderMessage::user("ping")]).buffered();
        match client.create_completions(request, CompletionOptions::default()).await.unwrap() {
            SdkOutput::Buffered { response, raw } => {
                assert_eq!(response.text(), "pong");
                assert_eq!(raw["choices"][0]["finish_reason"], "stop");
            }
            other => panic!("Expected buffered output, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streaming_completion_over_http() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"po\"},\"index\":0}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ng\"},\"index\":0}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\",\"index\":0}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = new_openai_client(test_provider(&server.uri()));
        let request = CompletionRequest::new("gpt-4o", vec![ProviderMessage::user("ping")]);
        let SdkOutput::Stream(stream) = client
            .create_completions(request, CompletionOptions::default())
            .await
            .unwrap()
        else {
            panic!("Expected a stream");
        };
        let chunks: Vec<_> = stream.collect().await;
        let text: String = chunks
            .iter()
            .filter_map(|c| match c {
                Ok(Chunk::TextDelta { text }) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "pong");
        let dones = chunks
            .iter()
            .filter(|c| matches!(c, Ok(Chunk::Done { .. })))
            .count();
        assert_eq!(dones, 1);
    }

    #[tokio::test]
    async fn test_streaming_error_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": "invalid_api_key", "message": "Unauthorized"}
            })))
            .mount(&server)
            .await;

        let client = new_openai_client(test_provider(&server.uri()));
        let request = CompletionRequest::new("gpt-4o", vec![ProviderMessage::user("ping")]);
        let err = client
            .create_completions(request, CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.message(), "Unauthorized");
    }

    #[tokio::test]
    async fn test_list_models_merges_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(query_param("model_type", "embedding"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "bge-m3"}, {"id": "gpt-4o"}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "gpt-4o", "owned_by": "openai"}]
            })))
            .mount(&server)
            .await;

        let config = OpenAiCompatConfig {
            model_list_queries: vec![String::new(), "model_type=embedding".to_string()],
            ..OpenAiCompatConfig::default()
        };
        let client = OpenAiCompatClient::new(test_provider(&server.uri()), config);
        let models = client.list_models().await.unwrap();
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["gpt-4o", "bge-m3"]);
    }

    #[tokio::test]
    async fn test_embedding_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(&server)
            .await;

        let client = new_openai_client(test_provider(&server.uri()));
        let dims = client
            .embedding_dimensions(&Model::new("text-embedding-3-small", "openai"))
            .await
            .unwrap();
        assert_eq!(dims, 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"url": "https://img/1.png"}]}))
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = new_openai_client(test_provider(&server.uri()));
        let cancel = crate::result::CancelHandle::new();
        let mut params = ImageParams::new("dall-e-3", "a cat");
        params.cancel = Some(cancel.clone());
        cancel.cancel();
        let err = client.generate_image(params).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}

//! AWS Bedrock client over the Converse API.
//!
//! Authenticates with a Bedrock API key sent as a bearer token. Completions
//! are always buffered; a streaming request is answered with a single
//! buffered response.

use crate::capability::{Capability, CapabilitySet, ClientKind};
use crate::error::ProviderError;
use crate::http::{self, SdkHandle};
use crate::result::run_cancellable;
use crate::tokens::estimate_value_tokens;
use crate::tools::{ExternalTool, ToolCallResponse, ToolCallStatus, ToolExecutionResult};
use crate::traits::{
    ApiClient, AssistantOutput, CompletionOptions, RequestTransformer, SdkMessage, SdkOutput,
    SdkTool, SdkToolCall,
};
use crate::types::{
    CompletionRequest, Model, ModelInfo, Provider, ProviderContent, ProviderMessage, Response,
    StopReason, Usage,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};

pub const BEDROCK_API_HOST: &str = "https://bedrock-runtime.us-east-1.amazonaws.com";

/// AWS Bedrock client.
pub struct BedrockClient {
    provider: Provider,
    sdk: SdkHandle,
}

impl BedrockClient {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            sdk: SdkHandle::new(),
        }
    }

    fn sdk(&self) -> Result<&reqwest::Client, ProviderError> {
        self.sdk.get(|| self.default_headers())
    }

    fn model_url(&self, model: &str, action: &str) -> String {
        format!("{}/model/{}/{action}", self.base_url(), encode_model_id(model))
    }

    /// The control-plane host that serves `foundation-models`.
    fn control_url(&self) -> String {
        self.base_url().replacen("bedrock-runtime", "bedrock", 1)
    }
}

/// Model ids contain `:` (e.g. `anthropic.claude-3-haiku-20240307-v1:0`),
/// which must be escaped in the path.
fn encode_model_id(model: &str) -> String {
    model.replace(':', "%3A").replace('/', "%2F")
}

#[async_trait]
impl ApiClient for BedrockClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Bedrock
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::all()
            .without(Capability::Streaming)
            .without(Capability::ImageGeneration)
    }

    fn base_url(&self) -> String {
        let host = self.provider.api_host.trim().trim_end_matches('/');
        if host.is_empty() {
            BEDROCK_API_HOST.to_string()
        } else {
            host.to_string()
        }
    }

    fn default_headers(&self) -> HeaderMap {
        http::bearer_headers(&self.provider.api_key)
    }

    async fn create_completions(
        &self,
        request: CompletionRequest,
        options: CompletionOptions,
    ) -> Result<SdkOutput, ProviderError> {
        if request.stream {
            tracing::debug!(model = %request.model, "Bedrock answers streaming requests buffered");
        }
        let body = build_request_body(&request);
        let url = self.model_url(&request.model, "converse");
        tracing::debug!(
            provider = %self.provider.id,
            model = %request.model,
            key = %http::redact(&self.provider.api_key),
            "Sending Bedrock converse request"
        );
        let call = async {
            let raw = http::send_json(self.sdk()?.post(&url).json(&body)).await?;
            let response = parse_response(&raw)?;
            Ok(SdkOutput::Buffered { raw, response })
        };
        run_cancellable(options.cancel.as_ref(), call).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/foundation-models", self.control_url());
        let raw = http::send_json(self.sdk()?.get(&url)).await?;
        let list: FoundationModelList = serde_json::from_value(raw)?;
        Ok(list
            .model_summaries
            .into_iter()
            .map(|m| ModelInfo {
                id: m.model_id,
                name: m.model_name,
                owned_by: m.provider_name,
            })
            .collect())
    }

    async fn embedding_dimensions(&self, model: &Model) -> Result<usize, ProviderError> {
        let url = self.model_url(&model.id, "invoke");
        let body = json!({"inputText": "hi"});
        let raw = http::send_json(self.sdk()?.post(&url).json(&body)).await?;
        raw["embedding"]
            .as_array()
            .map(Vec::len)
            .ok_or_else(|| ProviderError::StreamError("Embedding response has no vector".to_string()))
    }

    fn request_transformer(&self) -> Result<Box<dyn RequestTransformer>, ProviderError> {
        Ok(Box::new(ConverseRequestTransformer))
    }

    fn convert_tools_to_sdk(&self, tools: &[ExternalTool]) -> Result<Vec<SdkTool>, ProviderError> {
        Ok(tools.iter().map(tool_spec).collect())
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
        let id = call["toolUseId"]
            .as_str()
            .ok_or_else(|| ProviderError::InvalidRequest("toolUse block has no toolUseId".to_string()))?;
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
            "content": [tool_result_block(&response.id, &result.joined_text(), result.is_error)],
        })))
    }

    fn build_sdk_messages(
        &self,
        existing: &[SdkMessage],
        output: &AssistantOutput,
        tool_results: &[SdkMessage],
        tool_calls: &[SdkToolCall],
    ) -> Result<Vec<SdkMessage>, ProviderError> {
        let mut messages = existing.to_vec();
        match output {
            AssistantOutput::Raw(raw) => {
                if let Some(message) = raw["output"].get("message") {
                    messages.push(message.clone());
                }
            }
            AssistantOutput::Text(text) => {
                let mut content = Vec::new();
                if !text.is_empty() {
                    content.push(json!({"text": text}));
                }
                content.extend(tool_calls.iter().map(|call| json!({"toolUse": call})));
                if !content.is_empty() {
                    messages.push(json!({"role": "assistant", "content": content}));
                }
            }
        }

        // Converse wants every tool result of a turn in one user message
        let blocks: Vec<Value> = tool_results
            .iter()
            .filter_map(|m| m["content"].as_array())
            .flatten()
            .cloned()
            .collect();
        if !blocks.is_empty() {
            messages.push(json!({"role": "user", "content": blocks}));
        }
        Ok(messages)
    }

    fn extract_messages_from_payload(&self, payload: &Value) -> Result<Vec<SdkMessage>, ProviderError> {
        Ok(payload["messages"].as_array().cloned().unwrap_or_default())
    }

    fn estimate_message_tokens(&self, message: &SdkMessage) -> Result<usize, ProviderError> {
        Ok(estimate_value_tokens(&message["content"]))
    }
}

// ── Converse wire helpers ──

pub(crate) fn build_request_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().filter_map(convert_message).collect();
    let mut body = json!({ "messages": messages });

    if let Some(ref system) = request.system {
        body["system"] = json!([{"text": system}]);
    }

    let mut inference = serde_json::Map::new();
    if let Some(max_tokens) = request.max_tokens {
        inference.insert("maxTokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = request.temperature {
        inference.insert("temperature".to_string(), json!(temperature));
    }
    if !inference.is_empty() {
        body["inferenceConfig"] = Value::Object(inference);
    }

    if !request.tools.is_empty() {
        body["toolConfig"] = json!({
            "tools": request.tools.iter().map(tool_spec).collect::<Vec<_>>(),
        });
    }

    body
}

fn tool_spec(tool: &ExternalTool) -> Value {
    json!({
        "toolSpec": {
            "name": tool.name,
            "description": tool.description,
            "inputSchema": {"json": tool.input_schema},
        }
    })
}

fn tool_result_block(tool_use_id: &str, text: &str, is_error: bool) -> Value {
    json!({
        "toolResult": {
            "toolUseId": tool_use_id,
            "content": [{"text": text}],
            "status": if is_error { "error" } else { "success" },
        }
    })
}

fn convert_message(msg: &ProviderMessage) -> Option<Value> {
    let role = match msg.role.as_str() {
        "assistant" => "assistant",
        "user" | "tool" => "user",
        _ => return None,
    };

    let content: Vec<Value> = msg
        .content
        .iter()
        .filter_map(|c| match c {
            ProviderContent::Text { text } => Some(json!({"text": text})),
            ProviderContent::ToolCall {
                id,
                name,
                arguments,
            } => Some(json!({"toolUse": {"toolUseId": id, "name": name, "input": arguments}})),
            ProviderContent::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => Some(tool_result_block(tool_call_id, content, *is_error)),
            ProviderContent::Image { data, mime_type } => {
                let format = mime_type.strip_prefix("image/")?;
                Some(json!({"image": {"format": format, "source": {"bytes": data}}}))
            }
        })
        .collect();

    if content.is_empty() {
        return None;
    }
    Some(json!({"role": role, "content": content}))
}

fn parse_stop_reason(reason: &str) -> StopReason {
    match reason {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

/// Parse a Converse response.
pub(crate) fn parse_response(raw: &Value) -> Result<Response, ProviderError> {
    let resp: ConverseResponse = serde_json::from_value(raw.clone())?;

    let content = resp
        .output
        .message
        .content
        .into_iter()
        .filter_map(|block| {
            if let Some(text) = block.text {
                return Some(ProviderContent::Text { text });
            }
            block.tool_use.map(|call| ProviderContent::ToolCall {
                id: call.tool_use_id,
                name: call.name,
                arguments: call.input,
            })
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
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
        },
    })
}

struct ConverseRequestTransformer;

impl RequestTransformer for ConverseRequestTransformer {
    fn transform(&self, request: &CompletionRequest) -> Result<Value, ProviderError> {
        Ok(build_request_body(request))
    }
}

// ── Converse wire types ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ConverseUsage,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseMessage,
}

#[derive(Debug, Deserialize)]
struct ConverseMessage {
    #[serde(default)]
    content: Vec<ConverseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseBlock {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_use: Option<ConverseToolUse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseToolUse {
    tool_use_id: String,
    name: String,
    #[serde(default)]
    input: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoundationModelList {
    #[serde(default)]
    model_summaries: Vec<FoundationModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoundationModel {
    model_id: String,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    provider_name: Option<String>,
}

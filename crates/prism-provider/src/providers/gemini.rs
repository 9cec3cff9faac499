//! Google Gemini client, for both AI Studio and Vertex AI endpoints.

use crate::capability::{Capability, CapabilitySet, ClientKind};
use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::http::{self, SdkHandle};
use crate::result::run_cancellable;
use crate::tokens::estimate_value_tokens;
use crate::tools::{ExternalTool, ToolCallResponse, ToolCallStatus, ToolExecutionResult};
use crate::traits::{
    ApiClient, AssistantOutput, CompletionOptions, RequestTransformer, ResponseChunkTransformer,
    SdkMessage, SdkOutput, SdkTool, SdkToolCall, TransformContext,
};
use crate::types::{
    CompletionRequest, Model, ModelInfo, Provider, ProviderContent, ProviderMessage, Response,
    StopReason, Usage,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};

pub const GEMINI_API_HOST: &str = "https://generativelanguage.googleapis.com";

/// Which Google endpoint family the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiFlavor {
    /// `{host}/v1beta`, key in `x-goog-api-key`.
    AiStudio,
    /// A Vertex publisher base URL, bearer access token.
    Vertex,
}

/// Gemini client.
pub struct GeminiClient {
    provider: Provider,
    flavor: GeminiFlavor,
    sdk: SdkHandle,
}

impl GeminiClient {
    pub fn new(provider: Provider) -> Self {
        Self::with_flavor(provider, GeminiFlavor::AiStudio)
    }

    pub fn with_flavor(provider: Provider, flavor: GeminiFlavor) -> Self {
        Self {
            provider,
            flavor,
            sdk: SdkHandle::new(),
        }
    }

    pub fn flavor(&self) -> GeminiFlavor {
        self.flavor
    }

    fn sdk(&self) -> Result<&reqwest::Client, ProviderError> {
        self.sdk.get(|| self.default_headers())
    }

    fn model_url(&self, model: &str, action: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:{action}", self.base_url())
    }

    async fn complete_buffered(&self, body: Value, model: &str) -> Result<SdkOutput, ProviderError> {
        let url = self.model_url(model, "generateContent");
        let raw = http::send_json(self.sdk()?.post(&url).json(&body)).await?;
        let response = parse_response(&raw)?;
        Ok(SdkOutput::Buffered { raw, response })
    }

    async fn complete_streaming(&self, body: Value, model: &str) -> Result<SdkOutput, ProviderError> {
        let url = format!("{}?alt=sse", self.model_url(model, "streamGenerateContent"));
        let es = http::open_event_source(self.sdk()?.post(&url).json(&body)).await?;
        let transformer = self.response_chunk_transformer(&TransformContext::new(model))?;
        Ok(SdkOutput::Stream(http::sse_chunks(es, transformer)))
    }
}

#[async_trait]
impl ApiClient for GeminiClient {
    fn kind(&self) -> ClientKind {
        match self.flavor {
            GeminiFlavor::AiStudio => ClientKind::Gemini,
            GeminiFlavor::Vertex => ClientKind::Vertex,
        }
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn capabilities(&self) -> CapabilitySet {
        let caps = CapabilitySet::all().without(Capability::ImageGeneration);
        match self.flavor {
            GeminiFlavor::AiStudio => caps,
            GeminiFlavor::Vertex => caps.without(Capability::ListModels),
        }
    }

    fn base_url(&self) -> String {
        let host = self.provider.api_host.trim().trim_end_matches('/');
        match self.flavor {
            GeminiFlavor::AiStudio => {
                let host = if host.is_empty() { GEMINI_API_HOST } else { host };
                let host = host.strip_suffix("/v1beta").unwrap_or(host);
                format!("{host}/v1beta")
            }
            GeminiFlavor::Vertex => host.to_string(),
        }
    }

    fn default_headers(&self) -> HeaderMap {
        match self.flavor {
            GeminiFlavor::AiStudio => {
                let mut headers = HeaderMap::new();
                if self.provider.has_api_key() {
                    http::insert_header(
                        &mut headers,
                        "x-goog-api-key",
                        self.provider.api_key.trim(),
                        true,
                    );
                }
                headers
            }
            GeminiFlavor::Vertex => http::bearer_headers(&self.provider.api_key),
        }
    }

    async fn create_completions(
        &self,
        request: CompletionRequest,
        options: CompletionOptions,
    ) -> Result<SdkOutput, ProviderError> {
        let body = build_request_body(&request);
        tracing::debug!(
            provider = %self.provider.id,
            model = %request.model,
            stream = request.stream,
            flavor = ?self.flavor,
            "Sending Gemini generateContent request"
        );
        let call = async {
            if request.stream {
                self.complete_streaming(body, &request.model).await
            } else {
                self.complete_buffered(body, &request.model).await
            }
        };
        run_cancellable(options.cancel.as_ref(), call).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.ensure(Capability::ListModels)?;
        let url = format!("{}/models", self.base_url());
        let raw = http::send_json(self.sdk()?.get(&url)).await?;
        let list: GeminiModelList = serde_json::from_value(raw)?;
        Ok(list
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.strip_prefix("models/").unwrap_or(&m.name).to_string(),
                name: m.display_name,
                owned_by: Some("google".to_string()),
            })
            .collect())
    }

    async fn embedding_dimensions(&self, model: &Model) -> Result<usize, ProviderError> {
        let url = self.model_url(&model.id, "embedContent");
        let body = json!({"content": {"parts": [{"text": "hi"}]}});
        let raw = http::send_json(self.sdk()?.post(&url).json(&body)).await?;
        raw["embedding"]["values"]
            .as_array()
            .map(Vec::len)
            .ok_or_else(|| ProviderError::StreamError("Embedding response has no vector".to_string()))
    }

    fn request_transformer(&self) -> Result<Box<dyn RequestTransformer>, ProviderError> {
        Ok(Box::new(GeminiRequestTransformer))
    }

    fn response_chunk_transformer(
        &self,
        _ctx: &TransformContext,
    ) -> Result<Box<dyn ResponseChunkTransformer>, ProviderError> {
        Ok(Box::new(GeminiChunkTransformer::default()))
    }

    fn convert_tools_to_sdk(&self, tools: &[ExternalTool]) -> Result<Vec<SdkTool>, ProviderError> {
        Ok(tools.iter().map(function_declaration).collect())
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
        let name = call["name"]
            .as_str()
            .ok_or_else(|| ProviderError::InvalidRequest("functionCall has no name".to_string()))?;
        // Gemini calls carry no id; the function name stands in for one
        let id = call["id"].as_str().unwrap_or(name);
        Ok(ToolCallResponse {
            id: id.to_string(),
            tool: tool.clone(),
            arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
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
            "parts": [{
                "functionResponse": {
                    "name": response.tool.name,
                    "response": {
                        "content": result.joined_text(),
                        "isError": result.is_error,
                    },
                },
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
        let mut messages = existing.to_vec();
        let parts = match output {
            AssistantOutput::Raw(raw) => raw["candidates"][0]["content"]["parts"]
                .as_array()
                .cloned()
                .unwrap_or_default(),
            AssistantOutput::Text(text) => {
                let mut parts = Vec::new();
                if !text.is_empty() {
                    parts.push(json!({"text": text}));
                }
                parts.extend(tool_calls.iter().map(|call| json!({"functionCall": call})));
                parts
            }
        };
        if !parts.is_empty() {
            messages.push(json!({"role": "model", "parts": parts}));
        }
        messages.extend(tool_results.iter().cloned());
        Ok(messages)
    }

    fn extract_messages_from_payload(&self, payload: &Value) -> Result<Vec<SdkMessage>, ProviderError> {
        Ok(payload["contents"].as_array().cloned().unwrap_or_default())
    }

    fn estimate_message_tokens(&self, message: &SdkMessage) -> Result<usize, ProviderError> {
        Ok(estimate_value_tokens(&message["parts"]))
    }
}

// ── Wire helpers ──

pub(crate) fn build_request_body(request: &CompletionRequest) -> Value {
    let contents: Vec<Value> = request.messages.iter().filter_map(convert_message).collect();
    let mut body = json!({ "contents": contents });

    if let Some(ref system) = request.system {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }

    let mut generation = serde_json::Map::new();
    if let Some(max_tokens) = request.max_tokens {
        generation.insert("maxOutputTokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = request.temperature {
        generation.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(ref thinking) = request.thinking {
        generation.insert(
            "thinkingConfig".to_string(),
            json!({
                "thinkingBudget": if thinking.enabled { thinking.budget_tokens } else { 0 },
                "includeThoughts": thinking.enabled,
            }),
        );
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }

    if !request.tools.is_empty() {
        body["tools"] = json!([{
            "functionDeclarations": request.tools.iter().map(function_declaration).collect::<Vec<_>>(),
        }]);
    }

    body
}

fn function_declaration(tool: &ExternalTool) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.input_schema,
    })
}

fn convert_message(msg: &ProviderMessage) -> Option<Value> {
    let role = match msg.role.as_str() {
        "assistant" | "model" => "model",
        "user" | "tool" => "user",
        _ => return None,
    };

    let parts: Vec<Value> = msg
        .content
        .iter()
        .map(|c| match c {
            ProviderContent::Text { text } => json!({"text": text}),
            ProviderContent::ToolCall {
                name, arguments, ..
            } => json!({"functionCall": {"name": name, "args": arguments}}),
            ProviderContent::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => json!({
                "functionResponse": {
                    "name": tool_call_id,
                    "response": {"content": content, "isError": is_error},
                }
            }),
            ProviderContent::Image { data, mime_type } => {
                json!({"inlineData": {"mimeType": mime_type, "data": data}})
            }
        })
        .collect();

    if parts.is_empty() {
        return None;
    }
    Some(json!({"role": role, "parts": parts}))
}

fn parse_finish_reason(reason: &str) -> StopReason {
    match reason {
        "MAX_TOKENS" => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

/// Parse a buffered generateContent response.
pub(crate) fn parse_response(raw: &Value) -> Result<Response, ProviderError> {
    let resp: GenerateContentResponse = serde_json::from_value(raw.clone())?;
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::StreamError("No candidates in response".to_string()))?;

    let mut content = Vec::new();
    let mut has_calls = false;
    for part in candidate.content.parts {
        if part.thought {
            continue;
        }
        if let Some(text) = part.text {
            content.push(ProviderContent::Text { text });
        }
        if let Some(call) = part.function_call {
            has_calls = true;
            content.push(ProviderContent::ToolCall {
                id: call.name.clone(),
                name: call.name,
                arguments: call.args,
            });
        }
    }

    let stop_reason = if has_calls {
        StopReason::ToolUse
    } else {
        candidate
            .finish_reason
            .as_deref()
            .map(parse_finish_reason)
            .unwrap_or(StopReason::EndTurn)
    };

    Ok(Response {
        content,
        stop_reason,
        usage: resp.usage_metadata.map(Usage::from).unwrap_or_default(),
    })
}

struct GeminiRequestTransformer;

impl RequestTransformer for GeminiRequestTransformer {
    fn transform(&self, request: &CompletionRequest) -> Result<Value, ProviderError> {
        Ok(build_request_body(request))
    }
}

/// Stream state for `streamGenerateContent?alt=sse`.
///
/// Gemini sends function calls whole, so only the stop reason needs
/// tracking: a turn that produced calls ends with `ToolUse`.
#[derive(Debug, Default)]
pub(crate) struct GeminiChunkTransformer {
    saw_tool_call: bool,
    stop: Option<StopReason>,
    done: bool,
}

impl ResponseChunkTransformer for GeminiChunkTransformer {
    fn transform(&mut self, data: &str) -> Result<Vec<Chunk>, ProviderError> {
        let value: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => return Ok(vec![]),
        };
        if value.get("error").is_some() {
            return Err(http::api_error(500, data));
        }
        let resp: GenerateContentResponse = serde_json::from_value(value)?;

        let mut chunks = Vec::new();
        if let Some(candidate) = resp.candidates.into_iter().next() {
            for part in candidate.content.parts {
                if let Some(text) = part.text {
                    if text.is_empty() {
                        continue;
                    }
                    if part.thought {
                        chunks.push(Chunk::ThinkingDelta { text });
                    } else {
                        chunks.push(Chunk::text(text));
                    }
                }
                if let Some(call) = part.function_call {
                    self.saw_tool_call = true;
                    chunks.push(Chunk::ToolCall {
                        id: call.name.clone(),
                        name: call.name,
                        arguments: call.args,
                    });
                }
            }
            if let Some(reason) = candidate.finish_reason {
                self.stop = Some(parse_finish_reason(&reason));
            }
        }

        if let Some(usage) = resp.usage_metadata {
            chunks.push(Chunk::Usage {
                usage: usage.into(),
            });
        }

        Ok(chunks)
    }

    fn finish(&mut self) -> Vec<Chunk> {
        let reason = if self.saw_tool_call {
            StopReason::ToolUse
        } else {
            self.stop.take().unwrap_or(StopReason::EndTurn)
        };
        http::done_once(&mut self.done, reason)
    }
}

// ── Gemini wire types ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

impl From<UsageMetadata> for Usage {
    fn from(usage: UsageMetadata) -> Self {
        Usage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThinkingConfig;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(host: &str) -> GeminiClient {
        GeminiClient::new(Provider::new("gemini", "gemini", host).with_api_key("g-key"))
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            test_client("").base_url(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(
            test_client("https://proxy.example/gemini/").base_url(),
            "https://proxy.example/gemini/v1beta"
        );
        assert_eq!(
            test_client("https://generativelanguage.googleapis.com/v1beta").base_url(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
    }

    #[test]
    fn test_build_request_body() {
        let mut request = CompletionRequest {
            system: Some("Be brief".to_string()),
            max_tokens: Some(256),
            thinking: Some(ThinkingConfig {
                enabled: true,
                budget_tokens: 1024,
            }),
            ..CompletionRequest::new(
                "gemini-2.5-flash",
                vec![ProviderMessage::user("Hi"), ProviderMessage::assistant("Hello")],
            )
        };
        request.tools = vec![ExternalTool::new("read", "Read", json!({"type": "object"}))];

        let body = build_request_body(&request);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 1024);
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "read");
    }

    #[test]
    fn test_chunk_transformer_text_and_calls() {
        let mut t = GeminiChunkTransformer::default();
        let chunks = t
            .transform(r#"{"candidates":[{"content":{"parts":[{"text":"thinking","thought":true},{"text":"Hi"}]}}]}"#)
            .unwrap();
        assert!(matches!(&chunks[0], Chunk::ThinkingDelta { .. }));
        assert!(matches!(&chunks[1], Chunk::TextDelta { text } if text == "Hi"));

        let chunks = t
            .transform(r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"read","args":{"path":"a"}}}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":6}}"#)
            .unwrap();
        assert!(matches!(&chunks[0], Chunk::ToolCall { name, .. } if name == "read"));
        assert!(matches!(&chunks[1], Chunk::Usage { usage } if usage.output_tokens == 6));

        assert!(matches!(
            t.finish().as_slice(),
            [Chunk::Done {
                reason: StopReason::ToolUse
            }]
        ));
        assert!(t.finish().is_empty());
    }

    #[test]
    fn test_stream_error_payload() {
        let mut t = GeminiChunkTransformer::default();
        let err = t
            .transform(r#"{"error":{"code":429,"message":"Resource exhausted"}}"#)
            .unwrap_err();
        assert_eq!(err.vendor_code(), Some("429"));
    }

    #[test]
    fn test_tool_bridging() {
        let client = test_client("");
        let tool = ExternalTool::new("read", "Read", json!({"type": "object"}));
        let call = json!({"name": "read", "args": {"path": "a"}});
        let found = client
            .convert_sdk_tool_call_to_external(&call, std::slice::from_ref(&tool))
            .unwrap()
            .unwrap();
        let response = client.convert_sdk_tool_call_to_response(&call, &found).unwrap();
        assert_eq!(response.id, "read");
        let message = client
            .convert_tool_result_to_sdk_message(
                &response,
                &ToolExecutionResult::text("ok"),
                &Model::new("gemini-2.5-flash", "gemini"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(message["parts"][0]["functionResponse"]["name"], "read");

        let messages = client
            .build_sdk_messages(&[], &AssistantOutput::Text(String::new()), &[message], &[call])
            .unwrap();
        assert_eq!(messages[0]["role"], "model");
        assert_eq!(messages[0]["parts"][0]["functionCall"]["name"], "read");
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_buffered_completion_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "pong"}]}, "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 1}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let request =
            CompletionRequest::new("gemini-2.5-flash", vec![ProviderMessage::user("ping")]).buffered();
        match client.create_completions(request, CompletionOptions::default()).await.unwrap() {
            SdkOutput::Buffered { response, .. } => assert_eq!(response.text(), "pong"),
            other => panic!("Expected buffered output, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streaming_uses_alt_sse() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"po\"}]}}]}\n\ndata: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ng\"}]},\"finishReason\":\"STOP\"}]}\n\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let request = CompletionRequest::new("gemini-2.5-flash", vec![ProviderMessage::user("ping")]);
        let SdkOutput::Stream(stream) = client
            .create_completions(request, CompletionOptions::default())
            .await
            .unwrap()
        else {
            panic!("Expected a stream");
        };
        use futures::StreamExt;
        let chunks: Vec<Chunk> = stream.map(|c| c.unwrap()).collect().await;
        let text: String = chunks
            .iter()
            .filter_map(|c| match c {
                Chunk::TextDelta { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "pong");
        assert!(matches!(chunks.last(), Some(Chunk::Done { reason: StopReason::EndTurn })));
    }

    #[tokio::test]
    async fn test_list_models_strips_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "models/gemini-2.5-pro", "displayName": "Gemini 2.5 Pro"}]
            })))
            .mount(&server)
            .await;

        let models = test_client(&server.uri()).list_models().await.unwrap();
        assert_eq!(models[0].id, "gemini-2.5-pro");
        assert_eq!(models[0].name.as_deref(), Some("Gemini 2.5 Pro"));
    }

    #[tokio::test]
    async fn test_embedding_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:embedContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embedding": {"values": [0.1, 0.2, 0.3, 0.4]}
            })))
            .mount(&server)
            .await;

        let dims = test_client(&server.uri())
            .embedding_dimensions(&Model::new("text-embedding-004", "gemini"))
            .await
            .unwrap();
        assert_eq!(dims, 4);
    }
}

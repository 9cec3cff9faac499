//! Clients for aggregators that serve several wire protocols under one key.
//!
//! A [`RoutedClient`] owns one sub-client per protocol and picks one for
//! each call from the model involved. Operations that carry no model
//! recognize the protocol from the shape of the vendor value instead.

use crate::capability::{CapabilitySet, ClientKind};
use crate::error::ProviderError;
use crate::providers::anthropic::AnthropicClient;
use crate::providers::gemini::GeminiClient;
use crate::providers::openai_compat::OpenAiCompatClient;
use crate::tools::{ExternalTool, ToolCallResponse, ToolExecutionResult};
use crate::traits::{
    ApiClient, AssistantOutput, CompletionOptions, RequestTransformer, ResponseChunkTransformer,
    SdkMessage, SdkOutput, SdkTool, SdkToolCall, TransformContext,
};
use crate::types::{CompletionRequest, ImageParams, Model, ModelInfo, Provider};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;

/// Which sub-client serves a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Route {
    pub fn client_kind(self) -> ClientKind {
        match self {
            Route::OpenAi => ClientKind::OpenAi,
            Route::Anthropic => ClientKind::Anthropic,
            Route::Gemini => ClientKind::Gemini,
        }
    }

    /// Recognize the protocol family of a vendor tool call or message.
    fn detect(value: &Value) -> Route {
        if value.get("function").is_some() || value.get("tool_calls").is_some() {
            Route::OpenAi
        } else if value["type"] == "tool_use" || value["type"] == "tool_result" {
            Route::Anthropic
        } else if value.get("parts").is_some()
            || (value.get("name").is_some() && value.get("args").is_some())
        {
            Route::Gemini
        } else if value["content"]
            .as_array()
            .is_some_and(|blocks| {
                blocks.iter().any(|b| {
                    matches!(b["type"].as_str(), Some("tool_use" | "tool_result" | "thinking"))
                })
            })
        {
            Route::Anthropic
        } else {
            Route::OpenAi
        }
    }
}

/// Picks the route for a model.
pub type RouteFn = fn(&Model) -> Route;

/// An aggregator client that delegates to per-protocol sub-clients.
pub struct RoutedClient {
    kind: ClientKind,
    provider: Provider,
    openai: OpenAiCompatClient,
    anthropic: AnthropicClient,
    gemini: GeminiClient,
    route: RouteFn,
}

impl RoutedClient {
    pub fn new(
        kind: ClientKind,
        provider: Provider,
        openai: OpenAiCompatClient,
        anthropic: AnthropicClient,
        gemini: GeminiClient,
        route: RouteFn,
    ) -> Self {
        Self {
            kind,
            provider,
            openai,
            anthropic,
            gemini,
            route,
        }
    }

    /// The route the given model id takes, using the configured model
    /// metadata when the provider knows the model.
    pub fn route_for(&self, model_id: &str) -> Route {
        (self.route)(&self.provider.model_or_default(model_id))
    }

    fn client(&self, route: Route) -> &dyn ApiClient {
        match route {
            Route::OpenAi => &self.openai,
            Route::Anthropic => &self.anthropic,
            Route::Gemini => &self.gemini,
        }
    }

    fn client_for_model(&self, model: &Model) -> &dyn ApiClient {
        self.client((self.route)(model))
    }

    fn client_for_id(&self, model_id: &str) -> &dyn ApiClient {
        self.client(self.route_for(model_id))
    }

    fn client_for_value(&self, value: &Value) -> &dyn ApiClient {
        self.client(Route::detect(value))
    }
}

#[async_trait]
impl ApiClient for RoutedClient {
    fn kind(&self) -> ClientKind {
        self.kind
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn capabilities(&self) -> CapabilitySet {
        self.openai
            .capabilities()
            .union(self.anthropic.capabilities())
            .union(self.gemini.capabilities())
    }

    fn base_url(&self) -> String {
        self.openai.base_url()
    }

    fn default_headers(&self) -> HeaderMap {
        self.openai.default_headers()
    }

    fn compatibility_types(&self, model: Option<&Model>) -> Vec<ClientKind> {
        match model {
            Some(model) => vec![(self.route)(model).client_kind()],
            None => vec![ClientKind::OpenAi, ClientKind::Anthropic, ClientKind::Gemini],
        }
    }

    async fn create_completions(
        &self,
        request: CompletionRequest,
        options: CompletionOptions,
    ) -> Result<SdkOutput, ProviderError> {
        let route = self.route_for(&request.model);
        tracing::debug!(
            provider = %self.provider.id,
            model = %request.model,
            ?route,
            "Routing completions request"
        );
        self.client(route).create_completions(request, options).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.openai.list_models().await
    }

    async fn embedding_dimensions(&self, model: &Model) -> Result<usize, ProviderError> {
        self.client_for_model(model).embedding_dimensions(model).await
    }

    async fn generate_image(&self, params: ImageParams) -> Result<Vec<String>, ProviderError> {
        self.client_for_id(&params.model).generate_image(params).await
    }

    fn request_transformer(&self) -> Result<Box<dyn RequestTransformer>, ProviderError> {
        self.openai.request_transformer()
    }

    fn response_chunk_transformer(
        &self,
        ctx: &TransformContext,
    ) -> Result<Box<dyn ResponseChunkTransformer>, ProviderError> {
        self.client_for_id(&ctx.model).response_chunk_transformer(ctx)
    }

    fn convert_tools_to_sdk(&self, tools: &[ExternalTool]) -> Result<Vec<SdkTool>, ProviderError> {
        self.openai.convert_tools_to_sdk(tools)
    }

    fn convert_sdk_tool_call_to_external(
        &self,
        call: &SdkToolCall,
        tools: &[ExternalTool],
    ) -> Result<Option<ExternalTool>, ProviderError> {
        self.client_for_value(call).convert_sdk_tool_call_to_external(call, tools)
    }

    fn convert_sdk_tool_call_to_response(
        &self,
        call: &SdkToolCall,
        tool: &ExternalTool,
    ) -> Result<ToolCallResponse, ProviderError> {
        self.client_for_value(call).convert_sdk_tool_call_to_response(call, tool)
    }

    fn convert_tool_result_to_sdk_message(
        &self,
        response: &ToolCallResponse,
        result: &ToolExecutionResult,
        model: &Model,
    ) -> Result<Option<SdkMessage>, ProviderError> {
        self.client_for_model(model)
            .convert_tool_result_to_sdk_message(response, result, model)
    }

    fn build_sdk_messages(
        &self,
        existing: &[SdkMessage],
        output: &AssistantOutput,
        tool_results: &[SdkMessage],
        tool_calls: &[SdkToolCall],
    ) -> Result<Vec<SdkMessage>, ProviderError> {
        let probe = tool_calls
            .first()
            .or_else(|| tool_results.first())
            .or_else(|| existing.last());
        let client: &dyn ApiClient = match probe {
            Some(value) => self.client_for_value(value),
            None => &self.openai,
        };
        client.build_sdk_messages(existing, output, tool_results, tool_calls)
    }

    fn extract_messages_from_payload(&self, payload: &Value) -> Result<Vec<SdkMessage>, ProviderError> {
        if payload.get("contents").is_some() {
            self.gemini.extract_messages_from_payload(payload)
        } else {
            self.openai.extract_messages_from_payload(payload)
        }
    }

    fn estimate_message_tokens(&self, message: &SdkMessage) -> Result<usize, ProviderError> {
        self.client_for_value(message).estimate_message_tokens(message)
    }
}

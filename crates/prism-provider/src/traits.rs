//! The capability contract every vendor client implements.

use crate::capability::{Capability, CapabilitySet, ClientKind};
use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::result::{CancelHandle, RawChunkStream};
use crate::tools::{ExternalTool, ToolCallResponse, ToolExecutionResult};
use crate::types::{CompletionRequest, ImageParams, Model, ModelInfo, Provider, Response};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;

/// A message in the vendor's own request format.
pub type SdkMessage = Value;
/// A tool declaration in the vendor's own format.
pub type SdkTool = Value;
/// A tool call as the vendor reports it.
pub type SdkToolCall = Value;
/// A buffered vendor response body.
pub type SdkRawOutput = Value;

/// What a vendor client hands back from a completion call.
pub enum SdkOutput {
    /// The whole response at once.
    Buffered { raw: SdkRawOutput, response: Response },
    /// Incremental output.
    Stream(RawChunkStream),
}

impl std::fmt::Debug for SdkOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdkOutput::Buffered { raw, .. } => f.debug_struct("Buffered").field("raw", raw).finish(),
            SdkOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Per-call options that are not part of the request itself.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub cancel: Option<CancelHandle>,
}

/// What a chunk transformer needs to know about the call it serves.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub model: String,
}

impl TransformContext {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

/// The assistant turn being appended by [`ApiClient::build_sdk_messages`].
#[derive(Debug, Clone)]
pub enum AssistantOutput {
    /// A buffered vendor response.
    Raw(SdkRawOutput),
    /// Text assembled from a stream.
    Text(String),
}

/// Maps an internal request onto a vendor request body.
pub trait RequestTransformer: Send + Sync {
    fn transform(&self, request: &CompletionRequest) -> Result<Value, ProviderError>;
}

/// Maps vendor stream events onto internal chunks.
///
/// Implementations keep state across events: tool-call argument fragments are
/// accumulated and surface as one complete [`Chunk::ToolCall`].
pub trait ResponseChunkTransformer: Send {
    /// Handle the data payload of one stream event.
    fn transform(&mut self, data: &str) -> Result<Vec<Chunk>, ProviderError>;

    /// Called once the vendor stream ends. Emits anything still pending,
    /// including the final `Done` if the vendor never sent one.
    fn finish(&mut self) -> Vec<Chunk>;
}

/// A client bound to one configured provider.
///
/// Every operation has a default that fails with
/// [`ProviderError::CapabilityUnsupported`]; implementations override the
/// operations named in their [`CapabilitySet`].
#[async_trait]
pub trait ApiClient: Send + Sync {
    fn kind(&self) -> ClientKind;

    fn provider(&self) -> &Provider;

    fn capabilities(&self) -> CapabilitySet;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// The typed failure for an operation this client does not offer.
    fn unsupported(&self, capability: Capability) -> ProviderError {
        ProviderError::unsupported(self.kind(), capability)
    }

    /// `Ok` when `capability` is advertised, the typed failure otherwise.
    fn ensure(&self, capability: Capability) -> Result<(), ProviderError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(self.unsupported(capability))
        }
    }

    /// Root URL the client sends requests to.
    fn base_url(&self) -> String {
        self.provider().api_host.trim_end_matches('/').to_string()
    }

    /// Headers sent with every request, authentication included.
    fn default_headers(&self) -> HeaderMap {
        HeaderMap::new()
    }

    /// Wire families this client speaks, for `model` if given.
    fn compatibility_types(&self, _model: Option<&Model>) -> Vec<ClientKind> {
        vec![self.kind()]
    }

    async fn create_completions(
        &self,
        _request: CompletionRequest,
        _options: CompletionOptions,
    ) -> Result<SdkOutput, ProviderError> {
        Err(self.unsupported(Capability::Completions))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Err(self.unsupported(Capability::ListModels))
    }

    /// Length of the vectors `model` produces.
    async fn embedding_dimensions(&self, _model: &Model) -> Result<usize, ProviderError> {
        Err(self.unsupported(Capability::Embeddings))
    }

    /// Generate images and return their URLs in vendor order.
    async fn generate_image(&self, _params: ImageParams) -> Result<Vec<String>, ProviderError> {
        Err(self.unsupported(Capability::ImageGeneration))
    }

    fn request_transformer(&self) -> Result<Box<dyn RequestTransformer>, ProviderError> {
        Err(self.unsupported(Capability::Completions))
    }

    fn response_chunk_transformer(
        &self,
        _ctx: &TransformContext,
    ) -> Result<Box<dyn ResponseChunkTransformer>, ProviderError> {
        Err(self.unsupported(Capability::Streaming))
    }

    fn convert_tools_to_sdk(&self, _tools: &[ExternalTool]) -> Result<Vec<SdkTool>, ProviderError> {
        Err(self.unsupported(Capability::ToolCalling))
    }

    /// The external tool a vendor tool call refers to, if any.
    fn convert_sdk_tool_call_to_external(
        &self,
        _call: &SdkToolCall,
        _tools: &[ExternalTool],
    ) -> Result<Option<ExternalTool>, ProviderError> {
        Err(self.unsupported(Capability::ToolCalling))
    }

    fn convert_sdk_tool_call_to_response(
        &self,
        _call: &SdkToolCall,
        _tool: &ExternalTool,
    ) -> Result<ToolCallResponse, ProviderError> {
        Err(self.unsupported(Capability::ToolCalling))
    }

    /// Vendor message carrying a tool's result back to the model.
    fn convert_tool_result_to_sdk_message(
        &self,
        _response: &ToolCallResponse,
        _result: &ToolExecutionResult,
        _model: &Model,
    ) -> Result<Option<SdkMessage>, ProviderError> {
        Err(self.unsupported(Capability::ToolCalling))
    }

    /// The conversation for the next tool-calling round: `existing`, then the
    /// assistant turn (with `tool_calls`), then `tool_results`.
    fn build_sdk_messages(
        &self,
        _existing: &[SdkMessage],
        _output: &AssistantOutput,
        _tool_results: &[SdkMessage],
        _tool_calls: &[SdkToolCall],
    ) -> Result<Vec<SdkMessage>, ProviderError> {
        Err(self.unsupported(Capability::ToolCalling))
    }

    /// Message list of a vendor request body.
    fn extract_messages_from_payload(&self, _payload: &Value) -> Result<Vec<SdkMessage>, ProviderError> {
        Err(self.unsupported(Capability::Completions))
    }

    fn estimate_message_tokens(&self, _message: &SdkMessage) -> Result<usize, ProviderError> {
        Err(self.unsupported(Capability::TokenEstimation))
    }
}

// Compile-time check: ApiClient must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn ApiClient) {}
};

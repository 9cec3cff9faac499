//! prism-provider: vendor client contract, implementations and dispatch.

pub mod capability;
pub mod chunk;
mod error;
pub mod factory;
pub(crate) mod http;
pub mod providers;
pub mod result;
pub mod tokens;
pub mod tools;
pub mod traits;
pub mod types;

pub use capability::{Capability, CapabilitySet, ClientKind};
pub use chunk::{Chunk, ChunkError};
pub use error::{ClassifiedError, ErrorCategory, ErrorKind, ProviderError};
pub use factory::{create_client, dispatch_rules, resolve};
pub use providers::anthropic::AnthropicClient;
pub use providers::bedrock::BedrockClient;
pub use providers::gemini::{GeminiClient, GeminiFlavor};
pub use providers::mixed::{Route, RoutedClient};
pub use providers::openai_compat::{new_openai_client, OpenAiCompatClient, OpenAiCompatConfig};
pub use providers::zhipu::new_zhipu_client;
pub use result::{run_cancellable, CancelHandle, ChunkStream, CompletionsResult, RawChunkStream};
pub use tools::{ExternalTool, ToolCallResponse, ToolCallStatus, ToolExecutionResult};
pub use traits::{
    ApiClient, AssistantOutput, CompletionOptions, RequestTransformer, ResponseChunkTransformer,
    SdkOutput, TransformContext,
};
pub use types::{
    CompletionRequest, EndpointType, ImageParams, Model, ModelInfo, Provider, ProviderContent,
    ProviderMessage, ProviderType, Response, StopReason, ThinkingConfig, Usage,
};

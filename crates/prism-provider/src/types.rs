//! Common types used by the client contract and implementations.

use crate::result::CancelHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor family tag of a provider.
///
/// Unknown tags are preserved in `Other` and fall through to the
/// OpenAI-compatible client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderType {
    OpenAi,
    AzureOpenAi,
    Anthropic,
    AwsBedrock,
    Gemini,
    VertexAi,
    Other(String),
}

impl ProviderType {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderType::OpenAi => "openai",
            ProviderType::AzureOpenAi => "azure-openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::AwsBedrock => "aws-bedrock",
            ProviderType::Gemini => "gemini",
            ProviderType::VertexAi => "vertexai",
            ProviderType::Other(tag) => tag,
        }
    }
}

impl From<String> for ProviderType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "openai" => ProviderType::OpenAi,
            "azure-openai" => ProviderType::AzureOpenAi,
            "anthropic" => ProviderType::Anthropic,
            "aws-bedrock" => ProviderType::AwsBedrock,
            "gemini" => ProviderType::Gemini,
            "vertexai" => ProviderType::VertexAi,
            _ => ProviderType::Other(tag),
        }
    }
}

impl From<&str> for ProviderType {
    fn from(tag: &str) -> Self {
        ProviderType::from(tag.to_string())
    }
}

impl From<ProviderType> for String {
    fn from(kind: ProviderType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured vendor endpoint. Loaded from configuration and read-only
/// for the duration of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProviderType,
    pub api_host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub models: Vec<Model>,
}

impl Provider {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<ProviderType>,
        api_host: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            api_host: api_host.into(),
            api_key: String::new(),
            enabled: true,
            models: Vec::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_models(mut self, models: Vec<Model>) -> Self {
        self.models = models;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether a non-blank API key is configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Look up a configured model by id.
    pub fn find_model(&self, id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.id == id)
    }

    /// The configured model with this id, or a bare one bound to this provider.
    pub fn model_or_default(&self, id: &str) -> Model {
        self.find_model(id)
            .cloned()
            .unwrap_or_else(|| Model::new(id, &self.id))
    }
}

/// Wire protocol a model is served through on aggregator providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointType {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "image-generation")]
    ImageGeneration,
    #[serde(rename = "jina-rerank")]
    JinaRerank,
}

/// A model offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Id of the owning provider.
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Free-tier model.
    #[serde(default, rename = "isFree")]
    pub free: bool,
    /// Where users obtain a key for this model, when one is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<EndpointType>,
}

impl Model {
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            group: None,
            free: false,
            api_key_link: None,
            endpoint_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_endpoint_type(mut self, endpoint_type: EndpointType) -> Self {
        self.endpoint_type = Some(endpoint_type);
        self
    }

    pub fn free(mut self) -> Self {
        self.free = true;
        self
    }

    /// Whether the user needs to follow a link to obtain a key.
    pub fn requires_api_key_link(&self) -> bool {
        self.api_key_link.is_some()
    }
}

/// A message in internal format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// Message role (user, assistant, tool).
    pub role: String,
    /// Content blocks.
    pub content: Vec<ProviderContent>,
}

impl ProviderMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![ProviderContent::Text { text: text.into() }],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: vec![ProviderContent::Text { text: text.into() }],
        }
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ProviderContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Content block in internal format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderContent {
    /// Plain text.
    #[serde(rename = "text")]
    Text { text: String },

    /// Tool invocation.
    #[serde(rename = "tool_call")]
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// Tool result.
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },

    /// Image.
    #[serde(rename = "image")]
    Image { data: String, mime_type: String },
}

/// Configuration for extended thinking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingConfig {
    pub enabled: bool,
    pub budget_tokens: usize,
}

/// Completion request in internal format.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Model id to run.
    pub model: String,
    pub messages: Vec<ProviderMessage>,
    pub tools: Vec<crate::tools::ExternalTool>,
    pub system: Option<String>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub thinking: Option<ThinkingConfig>,
    /// Ask for incremental output when the client supports it.
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ProviderMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            ..Default::default()
        }
    }

    pub fn buffered(mut self) -> Self {
        self.stream = false;
        self
    }
}

/// Non-streaming response in internal format.
#[derive(Debug, Clone)]
pub struct Response {
    pub content: Vec<ProviderContent>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl Response {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ProviderContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// A model as reported by a vendor's listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owned_by: Option<String>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            owned_by: None,
        }
    }
}

/// Image generation parameters.
#[derive(Debug, Clone)]
pub struct ImageParams {
    pub model: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// `WIDTHxHEIGHT`, e.g. `1024x1024`.
    pub image_size: String,
    pub batch_size: u32,
    pub quality: Option<String>,
    pub cancel: Option<CancelHandle>,
}

impl ImageParams {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            negative_prompt: None,
            image_size: "1024x1024".to_string(),
            batch_size: 1,
            quality: None,
            cancel: None,
        }
    }
}

//! The unit of streamed completion output.

use crate::error::{ErrorCategory, ProviderError};
use crate::tools::{ToolCallResponse, ToolExecutionResult};
use crate::types::{StopReason, Usage};
use serde::{Deserialize, Serialize};

/// One discrete piece of a completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    /// A piece of assistant text.
    TextDelta { text: String },
    /// A piece of reasoning output.
    ThinkingDelta { text: String },
    /// A complete tool call, arguments fully assembled.
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// Result of an executed tool, fed back into the stream by the caller.
    ToolResult {
        response: ToolCallResponse,
        result: ToolExecutionResult,
    },
    /// Token usage update.
    Usage { usage: Usage },
    /// The response finished normally.
    Done { reason: StopReason },
    /// The call failed. Always the last chunk of its stream.
    Error(ChunkError),
}

impl Chunk {
    pub fn text(text: impl Into<String>) -> Self {
        Chunk::TextDelta { text: text.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Chunk::Error(_))
    }
}

/// Serializable description of a failure carried inside a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkError {
    pub category: ErrorCategory,
    /// Presentation key for classified errors, otherwise the error text.
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub code: Option<String>,
}

impl From<&ProviderError> for ChunkError {
    fn from(error: &ProviderError) -> Self {
        Self {
            category: error.category(),
            message: error.to_string(),
            status: error.status(),
            code: error.vendor_code().map(str::to_string),
        }
    }
}

impl From<&ProviderError> for Chunk {
    fn from(error: &ProviderError) -> Self {
        Chunk::Error(ChunkError::from(error))
    }
}

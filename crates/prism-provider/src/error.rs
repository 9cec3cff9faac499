//! Error types for the prism-provider crate.

use crate::capability::{Capability, ClientKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur in vendor client operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        /// Vendor-specific error code from the response body, if any.
        code: Option<String>,
        message: String,
    },

    /// Invalid model specified
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Request parameters rejected before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Provider is switched off in configuration
    #[error("Provider disabled: {0}")]
    ProviderDisabled(String),

    /// Stream parsing error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client does not implement this operation for its vendor family
    #[error("{client} does not support {capability}")]
    CapabilityUnsupported {
        client: ClientKind,
        capability: Capability,
    },

    /// The call was aborted through its cancel handle
    #[error("Request cancelled")]
    Cancelled,

    /// A vendor failure mapped onto the canonical taxonomy
    #[error(transparent)]
    Classified(ClassifiedError),
}

impl ProviderError {
    pub fn unsupported(client: ClientKind, capability: Capability) -> Self {
        ProviderError::CapabilityUnsupported { client, capability }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http(e) => e.status().map(|s| s.as_u16()),
            ProviderError::ApiError { status, .. } => Some(*status),
            ProviderError::Classified(c) => c.source.status(),
            _ => None,
        }
    }

    /// Vendor error code carried by the error, if any.
    pub fn vendor_code(&self) -> Option<&str> {
        match self {
            ProviderError::ApiError { code, .. } => code.as_deref(),
            ProviderError::Classified(c) => c.source.vendor_code(),
            _ => None,
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            ProviderError::ApiError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ProviderError::CapabilityUnsupported { .. } => ErrorCategory::CapabilityUnsupported,
            ProviderError::Cancelled => ErrorCategory::Cancellation,
            ProviderError::Classified(c) => c.kind.category(),
            ProviderError::InvalidModel(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::ProviderDisabled(_) => ErrorCategory::InvalidRequest,
            _ => ErrorCategory::Transport,
        }
    }
}

/// Canonical error kinds produced by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoApiKey,
    QuotaExceeded,
    InsufficientBalance,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoApiKey => "no_api_key",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::InsufficientBalance => "insufficient_balance",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::NoApiKey => ErrorCategory::Auth,
            ErrorKind::QuotaExceeded => ErrorCategory::Quota,
            ErrorKind::InsufficientBalance => ErrorCategory::Balance,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    CapabilityUnsupported,
    Auth,
    Quota,
    Balance,
    InvalidRequest,
    Transport,
    Cancellation,
}

/// A vendor error reduced to a canonical kind.
///
/// Displays as the presentation key `"<vendor>.<kind>"`, e.g. `zhipu.no_api_key`.
#[derive(Debug)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub vendor: String,
    pub source: Box<ProviderError>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, vendor: impl Into<String>, source: ProviderError) -> Self {
        Self {
            kind,
            vendor: vendor.into(),
            source: Box::new(source),
        }
    }

    /// Presentation key, `"<vendor>.<kind>"`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.vendor, self.kind)
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl std::error::Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_key_and_source() {
        let inner = ProviderError::ApiError {
            status: 401,
            code: None,
            message: "Unauthorized".to_string(),
        };
        let err = ProviderError::Classified(ClassifiedError::new(ErrorKind::NoApiKey, "zhipu", inner));
        assert_eq!(err.to_string(), "zhipu.no_api_key");
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.category(), ErrorCategory::Auth);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_unsupported_display() {
        let err = ProviderError::unsupported(ClientKind::Anthropic, Capability::Embeddings);
        assert_eq!(err.to_string(), "anthropic client does not support embeddings");
        assert_eq!(err.category(), ErrorCategory::CapabilityUnsupported);
    }

    #[test]
    fn test_api_error_accessors() {
        let err = ProviderError::ApiError {
            status: 429,
            code: Some("1113".to_string()),
            message: "balance".to_string(),
        };
        assert_eq!(err.vendor_code(), Some("1113"));
        assert_eq!(err.message(), "balance");
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(!err.is_cancelled());
        assert!(ProviderError::Cancelled.is_cancelled());
    }
}

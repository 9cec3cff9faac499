//! Vertex AI client: the Gemini wire format behind a publisher base URL.
//!
//! The provider's `apiHost` is the full publisher root, e.g.
//! `https://us-central1-aiplatform.googleapis.com/v1/projects/P/locations/us-central1/publishers/google`,
//! and its `apiKey` is an OAuth access token.

use crate::providers::gemini::{GeminiClient, GeminiFlavor};
use crate::types::Provider;

/// Create the Vertex AI client.
pub fn new_vertex_client(provider: Provider) -> GeminiClient {
    GeminiClient::with_flavor(provider, GeminiFlavor::Vertex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, ClientKind};
    use crate::error::ProviderError;
    use crate::traits::ApiClient;

    const HOST: &str =
        "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/us-central1/publishers/google/";

    #[test]
    fn test_vertex_kind_and_auth() {
        let client = new_vertex_client(Provider::new("vertexai", "vertexai", HOST).with_api_key("ya29.token"));
        assert_eq!(client.kind(), ClientKind::Vertex);
        assert_eq!(client.base_url(), HOST.trim_end_matches('/'));
        assert_eq!(client.default_headers()["authorization"], "Bearer ya29.token");
        assert!(client.default_headers().get("x-goog-api-key").is_none());
    }

    #[tokio::test]
    async fn test_vertex_has_no_model_listing() {
        let client = new_vertex_client(Provider::new("vertexai", "vertexai", HOST));
        assert!(!client.supports(Capability::ListModels));
        let err = client.list_models().await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::CapabilityUnsupported {
                client: ClientKind::Vertex,
                capability: Capability::ListModels
            }
        ));
    }
}

//! Aihubmix aggregator: one key, three wire protocols chosen by model id.

use crate::capability::ClientKind;
use crate::providers::anthropic::AnthropicClient;
use crate::providers::gemini::GeminiClient;
use crate::providers::mixed::{Route, RoutedClient};
use crate::providers::openai_compat::{OpenAiCompatClient, OpenAiCompatConfig};
use crate::types::{Model, Provider};

pub const AIHUBMIX_API_HOST: &str = "https://aihubmix.com";

/// `claude*` speaks Anthropic, `gemini*` speaks Gemini unless it is a
/// `-nothink` or `imagen` variant, everything else speaks OpenAI.
pub fn aihubmix_route(model: &Model) -> Route {
    let id = model.id.to_lowercase();
    if id.starts_with("claude") {
        Route::Anthropic
    } else if id.starts_with("gemini") && !id.ends_with("-nothink") && !id.contains("imagen") {
        Route::Gemini
    } else {
        Route::OpenAi
    }
}

/// Create the Aihubmix client.
pub fn new_aihubmix_client(provider: Provider) -> RoutedClient {
    let host = provider.api_host.trim().trim_end_matches('/');
    let host = if host.is_empty() { AIHUBMIX_API_HOST } else { host }.to_string();

    let openai = OpenAiCompatClient::new(
        Provider {
            api_host: host.clone(),
            ..provider.clone()
        },
        OpenAiCompatConfig {
            kind: ClientKind::OpenAi,
            ..OpenAiCompatConfig::default()
        },
    );
    let anthropic = AnthropicClient::new(Provider {
        api_host: host.clone(),
        ..provider.clone()
    });
    let gemini = GeminiClient::new(Provider {
        api_host: format!("{host}/gemini"),
        ..provider.clone()
    });

    RoutedClient::new(
        ClientKind::Aihubmix,
        provider,
        openai,
        anthropic,
        gemini,
        aihubmix_route,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ApiClient, CompletionOptions, SdkOutput};
    use crate::types::{CompletionRequest, ProviderMessage};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_route_by_model_id() {
        let route = |id: &str| aihubmix_route(&Model::new(id, "aihubmix"));
        assert_eq!(route("claude-sonnet-4-20250514"), Route::Anthropic);
        assert_eq!(route("gemini-2.5-pro"), Route::Gemini);
        assert_eq!(route("gemini-2.5-flash-nothink"), Route::OpenAi);
        assert_eq!(route("gemini-imagen-3"), Route::OpenAi);
        assert_eq!(route("gpt-4o"), Route::OpenAi);
        assert_eq!(route("deepseek-chat"), Route::OpenAi);
    }

    #[test]
    fn test_compatibility_types() {
        let client = new_aihubmix_client(Provider::new("aihubmix", "openai", ""));
        assert_eq!(client.kind(), ClientKind::Aihubmix);
        assert_eq!(client.compatibility_types(None).len(), 3);
        assert_eq!(
            client.compatibility_types(Some(&Model::new("claude-3-5-haiku", "aihubmix"))),
            vec![ClientKind::Anthropic]
        );
        assert_eq!(client.base_url(), "https://aihubmix.com/v1");
    }

    #[tokio::test]
    async fn test_gemini_models_use_gemini_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini/v1beta/models/gemini-2.5-pro:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "from gemini"}]}, "finishReason": "STOP"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "from claude"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 1, "output_tokens": 1}
            })))
            .mount(&server)
            .await;

        let client = new_aihubmix_client(
            Provider::new("aihubmix", "openai", server.uri()).with_api_key("ahm-key"),
        );
        for (model, expected) in [("gemini-2.5-pro", "from gemini"), ("claude-3-5-haiku", "from claude")] {
            let request = CompletionRequest::new(model, vec![ProviderMessage::user("hi")]).buffered();
            match client.create_completions(request, CompletionOptions::default()).await.unwrap() {
                SdkOutput::Buffered { response, .. } => assert_eq!(response.text(), expected),
                other => panic!("Expected buffered output, got: {other:?}"),
            }
        }
    }
}

//! New-API gateway: routes each model by its configured endpoint type.

use crate::capability::ClientKind;
use crate::providers::anthropic::AnthropicClient;
use crate::providers::gemini::GeminiClient;
use crate::providers::mixed::{Route, RoutedClient};
use crate::providers::openai_compat::{OpenAiCompatClient, OpenAiCompatConfig};
use crate::types::{EndpointType, Model, Provider};

/// Models without an endpoint type fall back to OpenAI.
pub fn new_api_route(model: &Model) -> Route {
    match model.endpoint_type {
        Some(EndpointType::Anthropic) => Route::Anthropic,
        Some(EndpointType::Gemini) => Route::Gemini,
        Some(EndpointType::OpenAi | EndpointType::ImageGeneration | EndpointType::JinaRerank)
        | None => Route::OpenAi,
    }
}

/// Create the New-API client.
pub fn new_new_api_client(provider: Provider) -> RoutedClient {
    let openai = OpenAiCompatClient::new(provider.clone(), OpenAiCompatConfig::default());
    let anthropic = AnthropicClient::new(provider.clone());
    let gemini = GeminiClient::new(provider.clone());

    RoutedClient::new(
        ClientKind::NewApi,
        provider,
        openai,
        anthropic,
        gemini,
        new_api_route,
    )
}

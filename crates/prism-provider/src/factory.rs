//! Provider to client dispatch.
//!
//! Rules are checked in order and the first match wins. Provider ids come
//! first so aggregators and vendors with their own quirks override their
//! declared type; anything unmatched speaks the OpenAI protocol.

use crate::capability::ClientKind;
use crate::providers::aihubmix::new_aihubmix_client;
use crate::providers::anthropic::AnthropicClient;
use crate::providers::bedrock::BedrockClient;
use crate::providers::gemini::GeminiClient;
use crate::providers::new_api::new_new_api_client;
use crate::providers::openai_compat::new_openai_client;
use crate::providers::ppio::new_ppio_client;
use crate::providers::vertex::new_vertex_client;
use crate::providers::zhipu::new_zhipu_client;
use crate::traits::ApiClient;
use crate::types::Provider;

/// What a dispatch rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKey {
    /// Exact provider id.
    Id(&'static str),
    /// Provider type tag.
    Type(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRule {
    pub key: RuleKey,
    pub kind: ClientKind,
}

impl DispatchRule {
    pub fn matches(&self, provider: &Provider) -> bool {
        match self.key {
            RuleKey::Id(id) => provider.id == id,
            RuleKey::Type(tag) => provider.kind.as_str() == tag,
        }
    }
}

/// Used when no rule matches.
pub const DEFAULT_CLIENT: ClientKind = ClientKind::OpenAi;

const DISPATCH_RULES: &[DispatchRule] = &[
    DispatchRule { key: RuleKey::Id("aihubmix"), kind: ClientKind::Aihubmix },
    DispatchRule { key: RuleKey::Id("new-api"), kind: ClientKind::NewApi },
    DispatchRule { key: RuleKey::Id("ppio"), kind: ClientKind::Ppio },
    DispatchRule { key: RuleKey::Id("zhipu"), kind: ClientKind::Zhipu },
    DispatchRule { key: RuleKey::Type("anthropic"), kind: ClientKind::Anthropic },
    DispatchRule { key: RuleKey::Type("aws-bedrock"), kind: ClientKind::Bedrock },
    DispatchRule { key: RuleKey::Type("gemini"), kind: ClientKind::Gemini },
    DispatchRule { key: RuleKey::Type("vertexai"), kind: ClientKind::Vertex },
];

/// The ordered dispatch table.
pub fn dispatch_rules() -> &'static [DispatchRule] {
    DISPATCH_RULES
}

/// Which client a provider gets, without building it.
pub fn resolve(provider: &Provider) -> ClientKind {
    DISPATCH_RULES
        .iter()
        .find(|rule| rule.matches(provider))
        .map(|rule| rule.kind)
        .unwrap_or(DEFAULT_CLIENT)
}

/// Build the client for a provider. Never fails: configuration problems
/// surface on the first call.
pub fn create_client(provider: &Provider) -> Box<dyn ApiClient> {
    let kind = resolve(provider);
    tracing::debug!(
        provider = %provider.id,
        provider_type = %provider.kind,
        client = %kind,
        "Creating API client"
    );

    let provider = provider.clone();
    match kind {
        ClientKind::Aihubmix => Box::new(new_aihubmix_client(provider)),
        ClientKind::NewApi => Box::new(new_new_api_client(provider)),
        ClientKind::Ppio => Box::new(new_ppio_client(provider)),
        ClientKind::Zhipu => Box::new(new_zhipu_client(provider)),
        ClientKind::Anthropic => Box::new(AnthropicClient::new(provider)),
        ClientKind::Bedrock => Box::new(BedrockClient::new(provider)),
        ClientKind::Gemini => Box::new(GeminiClient::new(provider)),
        ClientKind::Vertex => Box::new(new_vertex_client(provider)),
        ClientKind::OpenAi => Box::new(new_openai_client(provider)),
    }
}

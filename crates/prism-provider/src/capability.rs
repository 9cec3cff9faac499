//! Capability flags advertised by every vendor client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One operation group of the client contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Chat completions, including the request/response transformers.
    Completions,
    /// Incremental (SSE) completion output.
    Streaming,
    /// Model listing.
    ListModels,
    /// Embedding dimension probing.
    Embeddings,
    /// Image generation.
    ImageGeneration,
    /// Tool schema conversion and multi-turn message building.
    ToolCalling,
    /// Approximate token accounting.
    TokenEstimation,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 7] = [
        Capability::Completions,
        Capability::Streaming,
        Capability::ListModels,
        Capability::Embeddings,
        Capability::ImageGeneration,
        Capability::ToolCalling,
        Capability::TokenEstimation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Completions => "completions",
            Capability::Streaming => "streaming",
            Capability::ListModels => "list_models",
            Capability::Embeddings => "embeddings",
            Capability::ImageGeneration => "image_generation",
            Capability::ToolCalling => "tool_calling",
            Capability::TokenEstimation => "token_estimation",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of capabilities a client advertises.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::of(&Capability::ALL)
    }

    pub fn of(capabilities: &[Capability]) -> Self {
        capabilities
            .iter()
            .fold(Self::empty(), |set, cap| set.with(*cap))
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0 |= capability.bit();
        self
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.0 &= !capability.bit();
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate over the advertised capabilities in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Concrete client implementation family, as selected by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientKind {
    OpenAi,
    Anthropic,
    Gemini,
    Vertex,
    Bedrock,
    Zhipu,
    Ppio,
    Aihubmix,
    NewApi,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::OpenAi => "openai",
            ClientKind::Anthropic => "anthropic",
            ClientKind::Gemini => "gemini",
            ClientKind::Vertex => "vertex",
            ClientKind::Bedrock => "bedrock",
            ClientKind::Zhipu => "zhipu",
            ClientKind::Ppio => "ppio",
            ClientKind::Aihubmix => "aihubmix",
            ClientKind::NewApi => "new-api",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} client", self.as_str())
    }
}

//! PPIO client built on the OpenAI-compatible transport.
//!
//! Embedding models are only listed when asked for explicitly, so model
//! listing merges both lists.

use crate::capability::{CapabilitySet, ClientKind};
use crate::providers::openai_compat::{ImageApi, OpenAiCompatClient, OpenAiCompatConfig};
use crate::types::Provider;

pub const PPIO_API_HOST: &str = "https://api.ppinfra.com/v3/openai/";

/// Create the PPIO client.
pub fn new_ppio_client(provider: Provider) -> OpenAiCompatClient {
    let config = OpenAiCompatConfig {
        kind: ClientKind::Ppio,
        capabilities: CapabilitySet::all(),
        image_api: ImageApi::OpenAi,
        extra_headers: Vec::new(),
        model_list_queries: vec![String::new(), "model_type=embedding".to_string()],
    };

    OpenAiCompatClient::new(provider, config)
}

//! Image generation entry point with provider checks.

use crate::config::api_key_for;
use prism_provider::{create_client, ClassifiedError, ErrorKind, ImageParams, Provider, ProviderError};

pub use prism_provider::providers::zhipu::{
    IMAGE_MODELS as ZHIPU_IMAGE_MODELS, IMAGE_QUALITIES as ZHIPU_IMAGE_QUALITIES,
    IMAGE_SIZES as ZHIPU_IMAGE_SIZES,
};

/// Generate images through the provider's client.
///
/// Fails before any request when the provider is disabled or has no key.
/// A cancelled call yields no URLs rather than an error.
pub async fn generate_images(
    provider: &Provider,
    params: ImageParams,
) -> Result<Vec<String>, ProviderError> {
    if !provider.enabled {
        return Err(ProviderError::ProviderDisabled(provider.id.clone()));
    }

    let mut provider = provider.clone();
    provider.api_key = api_key_for(&provider);
    if !provider.has_api_key() {
        return Err(ProviderError::Classified(ClassifiedError::new(
            ErrorKind::NoApiKey,
            provider.id.clone(),
            ProviderError::InvalidRequest("API key is not configured".to_string()),
        )));
    }

    let client = create_client(&provider);
    tracing::debug!(
        provider = %provider.id,
        model = %params.model,
        size = %params.image_size,
        count = params.batch_size,
        "Generating images"
    );

    let urls = match client.generate_image(params).await {
        Ok(urls) => urls,
        Err(ProviderError::Cancelled) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let total = urls.len();
    let urls: Vec<String> = urls.into_iter().filter(|u| !u.trim().is_empty()).collect();
    if urls.len() < total {
        tracing::warn!(
            provider = %provider.id,
            dropped = total - urls.len(),
            "Dropping blank image URLs"
        );
    }
    Ok(urls)
}

//! Zhipu AI (BigModel) client: GLM chat plus CogView image generation.
//!
//! Chat uses the OpenAI-compatible API at `https://open.bigmodel.cn/api/paas/v4`.
//! Image generation has its own request shape and a content-filter report.

use crate::capability::{CapabilitySet, ClientKind};
use crate::error::ProviderError;
use crate::http;
use crate::providers::openai_compat::{ImageApi, OpenAiCompatClient, OpenAiCompatConfig};
use crate::types::{ImageParams, Provider};
use serde::Deserialize;
use serde_json::json;

pub const ZHIPU_API_HOST: &str = "https://open.bigmodel.cn/api/paas/v4/";
const ZHIPU_REFERER: &str = "https://open.bigmodel.cn/";
const ZHIPU_TITLE: &str = "Prism";

/// CogView models offered for painting.
pub const IMAGE_MODELS: [&str; 2] = ["cogview-3-flash", "cogview-4-250304"];

/// Sizes accepted by the image endpoint.
pub const IMAGE_SIZES: [&str; 7] = [
    "1024x1024",
    "768x1344",
    "864x1152",
    "1344x768",
    "1152x864",
    "1440x720",
    "720x1440",
];

pub const IMAGE_QUALITIES: [&str; 2] = ["standard", "high"];

const DEFAULT_QUALITY: &str = "standard";
const DEFAULT_STYLE: &str = "vivid";

/// Filter levels above this are reported as warnings.
const CONTENT_FILTER_WARN_LEVEL: u32 = 1;

/// Create the Zhipu client.
pub fn new_zhipu_client(provider: Provider) -> OpenAiCompatClient {
    let config = OpenAiCompatConfig {
        kind: ClientKind::Zhipu,
        capabilities: CapabilitySet::all(),
        image_api: ImageApi::Zhipu,
        extra_headers: vec![
            ("HTTP-Referer".to_string(), ZHIPU_REFERER.to_string()),
            ("X-Title".to_string(), ZHIPU_TITLE.to_string()),
            ("X-Api-Key".to_string(), provider.api_key.trim().to_string()),
        ],
        model_list_queries: vec![String::new()],
    };

    OpenAiCompatClient::new(provider, config)
}

/// `POST {base_url}/images/generations` with the Zhipu request shape.
///
/// A content-filter level above 1 is logged but does not drop the images:
/// every URL in `data` is returned in order.
pub(crate) async fn generate_images(
    sdk: &reqwest::Client,
    base_url: &str,
    params: &ImageParams,
) -> Result<Vec<String>, ProviderError> {
    if !IMAGE_SIZES.contains(&params.image_size.as_str()) {
        return Err(ProviderError::InvalidRequest(format!(
            "Unsupported image size {} (expected one of {})",
            params.image_size,
            IMAGE_SIZES.join(", ")
        )));
    }

    let body = json!({
        "model": params.model,
        "prompt": params.prompt,
        "n": params.batch_size,
        "size": params.image_size,
        "quality": params.quality.as_deref().unwrap_or(DEFAULT_QUALITY),
        "style": DEFAULT_STYLE,
    });
    let url = format!("{base_url}/images/generations");
    tracing::debug!(%url, model = %params.model, size = %params.image_size, "Requesting Zhipu images");

    let raw = http::send_json(sdk.post(&url).json(&body)).await?;
    let response: ZhipuImageResponse = serde_json::from_value(raw)?;

    if let Some(filter) = response.content_filter.first() {
        if filter.level > CONTENT_FILTER_WARN_LEVEL {
            tracing::warn!(
                role = %filter.role,
                level = filter.level,
                images = response.data.len(),
                "Zhipu content filter flagged the generation"
            );
        }
    }

    tracing::debug!(created = response.created, images = response.data.len(), "Zhipu images generated");
    Ok(response.data.into_iter().map(|item| item.url).collect())
}

#[derive(Debug, Deserialize)]
struct ZhipuImageResponse {
    #[serde(default)]
    created: u64,
    #[serde(default)]
    data: Vec<ZhipuImage>,
    #[serde(default)]
    content_filter: Vec<ContentFilter>,
}

#[derive(Debug, Deserialize)]
struct ZhipuImage {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentFilter {
    #[serde(default)]
    role: String,
    #[serde(default)]
    level: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::traits::ApiClient;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn zhipu_provider(host: &str) -> Provider {
        Provider::new("zhipu", "openai", host).with_api_key("zk-test")
    }

    #[test]
    fn test_zhipu_client_kind_and_headers() {
        let client = new_zhipu_client(zhipu_provider(ZHIPU_API_HOST));
        assert_eq!(client.kind(), ClientKind::Zhipu);
        assert_eq!(client.base_url(), "https://open.bigmodel.cn/api/paas/v4");
        assert!(client.supports(Capability::ImageGeneration));
        let headers = client.default_headers();
        assert_eq!(headers["authorization"], "Bearer zk-test");
        assert_eq!(headers["http-referer"], ZHIPU_REFERER);
        assert_eq!(headers["x-api-key"], "zk-test");
    }

    #[tokio::test]
    async fn test_generate_images() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(header("authorization", "Bearer zk-test"))
            .and(body_partial_json(json!({
                "model": "cogview-3-flash",
                "n": 2,
                "size": "1024x1024",
                "quality": "standard",
                "style": "vivid"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1,
                "data": [{"url": "https://img/1.png"}, {"url": "https://img/2.png"}]
            })))
            .mount(&server)
            .await;

        let client = new_zhipu_client(zhipu_provider(&format!("{}/", server.uri())));
        let mut params = ImageParams::new("cogview-3-flash", "a cat");
        params.batch_size = 2;
        let urls = client.generate_image(params).await.unwrap();
        assert_eq!(urls, vec!["https://img/1.png", "https://img/2.png"]);
    }

    #[tokio::test]
    async fn test_content_filtered_images_still_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1,
                "data": [{"url": "https://img/a.png"}, {"url": "https://img/b.png"}],
                "content_filter": [{"role": "assistant", "level": 2}]
            })))
            .mount(&server)
            .await;

        let client = new_zhipu_client(zhipu_provider(&format!("{}/", server.uri())));
        let urls = client
            .generate_image(ImageParams::new("cogview-4-250304", "a cat"))
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://img/a.png", "https://img/b.png"]);
    }

    #[tokio::test]
    async fn test_image_error_keeps_status_and_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": "1113", "message": "余额不足"}
            })))
            .mount(&server)
            .await;

        let client = new_zhipu_client(zhipu_provider(&format!("{}/", server.uri())));
        let err = client
            .generate_image(ImageParams::new("cogview-3-flash", "a cat"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.vendor_code(), Some("1113"));
    }

    #[tokio::test]
    async fn test_rejects_unknown_size() {
        let client = new_zhipu_client(zhipu_provider(ZHIPU_API_HOST));
        let mut params = ImageParams::new("cogview-3-flash", "a cat");
        params.image_size = "999x999".to_string();
        let err = client.generate_image(params).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}

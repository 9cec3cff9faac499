//! Shared HTTP plumbing: the memoized client, vendor error bodies and SSE.

use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::result::RawChunkStream;
use crate::traits::ResponseChunkTransformer;
use futures::StreamExt;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;

/// Lazily built `reqwest::Client`, created at most once per vendor client.
#[derive(Debug, Default)]
pub(crate) struct SdkHandle {
    cell: OnceCell<Client>,
}

impl SdkHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The memoized client, building it from `headers` on first use.
    pub(crate) fn get(&self, headers: impl FnOnce() -> HeaderMap) -> Result<&Client, ProviderError> {
        self.cell.get_or_try_init(|| {
            tracing::debug!("Building HTTP client");
            Client::builder()
                .default_headers(headers())
                .build()
                .map_err(ProviderError::Http)
        })
    }

    #[cfg(test)]
    pub(crate) fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Insert a header, skipping values that are not valid header text.
pub(crate) fn insert_header(headers: &mut HeaderMap, name: &str, value: &str, sensitive: bool) {
    let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
        tracing::warn!(header = name, "Skipping invalid header name");
        return;
    };
    match HeaderValue::from_str(value) {
        Ok(mut value) => {
            value.set_sensitive(sensitive);
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Skipping header with invalid value"),
    }
}

/// `Authorization: Bearer <key>`, omitted when the key is blank.
pub(crate) fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if !api_key.trim().is_empty() {
        insert_header(&mut headers, "authorization", &format!("Bearer {}", api_key.trim()), true);
    }
    headers
}

/// Key shortened for logs.
pub(crate) fn redact(key: &str) -> String {
    let key = key.trim();
    if key.len() <= 8 {
        return "***".to_string();
    }
    let head: String = key.chars().take(4).collect();
    format!("{head}***")
}

/// Build an `ApiError` from a failed response body.
///
/// Understands `{"error": {"code", "message"}}`, `{"code", "message"}`,
/// `{"error": "..."}` and a JSON array wrapping any of those.
pub(crate) fn api_error(status: u16, body: &str) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let value = match parsed {
        Some(Value::Array(mut items)) if !items.is_empty() => Some(items.swap_remove(0)),
        other => other,
    };

    let (code, message) = match &value {
        Some(v) => {
            let inner = match v.get("error") {
                Some(e) if e.is_object() => e,
                _ => v,
            };
            let code = inner.get("code").and_then(code_text);
            let message = inner
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| v.get("error").and_then(Value::as_str))
                .or_else(|| v.get("message").and_then(Value::as_str))
                .map(str::to_string);
            (code, message)
        }
        None => (None, None),
    };

    let message = message.unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            body.trim().to_string()
        }
    });

    ProviderError::ApiError {
        status,
        code,
        message,
    }
}

fn code_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    api_error(status, &body)
}

/// Send a request and decode a JSON body, mapping non-2xx into `ApiError`.
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(ProviderError::Http)?;
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response.json().await.map_err(ProviderError::Http)
}

/// Open an SSE connection and wait until the server accepted it.
///
/// Failures before the first event (bad status, wrong content type) come
/// back as errors here instead of inside the stream.
pub(crate) async fn open_event_source(request: RequestBuilder) -> Result<EventSource, ProviderError> {
    let mut es = EventSource::new(request)
        .map_err(|e| ProviderError::StreamError(format!("Cannot open event stream: {e}")))?;
    es.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

    match es.next().await {
        Some(Ok(Event::Open)) => Ok(es),
        Some(Ok(Event::Message(_))) => Err(ProviderError::StreamError(
            "Event stream sent data before opening".to_string(),
        )),
        Some(Err(e)) => {
            es.close();
            Err(sse_error(e).await)
        }
        None => Err(ProviderError::StreamError("Event stream closed immediately".to_string())),
    }
}

async fn sse_error(error: reqwest_eventsource::Error) -> ProviderError {
    use reqwest_eventsource::Error as SseError;
    match error {
        SseError::Transport(e) => ProviderError::Http(e),
        SseError::InvalidStatusCode(_, response) => error_from_response(response).await,
        SseError::InvalidContentType(_, response) => error_from_response(response).await,
        other => ProviderError::StreamError(other.to_string()),
    }
}

/// Turn an open event source into a stream of chunks.
///
/// The transformer sees every message's data. When the server closes the
/// stream, `finish()` flushes whatever the transformer still holds.
pub(crate) fn sse_chunks(
    es: EventSource,
    transformer: Box<dyn ResponseChunkTransformer>,
) -> RawChunkStream {
    Box::pin(async_stream::stream! {
        let mut es = es;
        let mut transformer = transformer;
        let mut failed = false;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => match transformer.transform(&message.data) {
                    Ok(chunks) => {
                        for chunk in chunks {
                            yield Ok(chunk);
                        }
                    }
                    Err(e) => {
                        failed = true;
                        yield Err(e);
                        break;
                    }
                },
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    failed = true;
                    yield Err(sse_error(e).await);
                    break;
                }
            }
        }
        es.close();

        if !failed {
            for chunk in transformer.finish() {
                yield Ok(chunk);
            }
        }
    })
}

/// Failure reported by an `error` event inside a vendor stream.
pub(crate) fn stream_event_error(kind: &str, message: &str) -> ProviderError {
    ProviderError::StreamError(format!("{kind}: {message}"))
}

/// `Done` the first time, nothing after that.
pub(crate) fn done_once(done: &mut bool, reason: crate::types::StopReason) -> Vec<Chunk> {
    if *done {
        return Vec::new();
    }
    *done = true;
    vec![Chunk::Done { reason }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StopReason;

    #[test]
    fn test_api_error_nested_code() {
        let err = api_error(429, r#"{"error":{"code":"1113","message":"余额不足"}}"#);
        match err {
            ProviderError::ApiError {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 429);
                assert_eq!(code.as_deref(), Some("1113"));
                assert_eq!(message, "余额不足");
            }
            other => panic!("Expected ApiError, got: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_shapes() {
        assert_eq!(api_error(400, r#"{"code":1304,"message":"m"}"#).vendor_code(), Some("1304"));
        assert_eq!(api_error(401, r#"{"error":"Unauthorized"}"#).message(), "Unauthorized");
        assert_eq!(
            api_error(400, r#"[{"error":{"code":400,"message":"bad"}}]"#).message(),
            "bad"
        );
        assert_eq!(api_error(502, "gateway down").message(), "gateway down");
        assert_eq!(api_error(500, "").message(), "HTTP 500");
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("short"), "***");
        assert_eq!(redact("sk-abcdefghijkl"), "sk-a***");
    }

    #[test]
    fn test_bearer_headers_skip_blank() {
        assert!(bearer_headers("  ").is_empty());
        let headers = bearer_headers("k1");
        assert_eq!(headers["authorization"], "Bearer k1");
        assert!(headers["authorization"].is_sensitive());
    }

    #[test]
    fn test_sdk_handle_memoized() {
        let handle = SdkHandle::new();
        assert!(!handle.is_initialized());
        let first = handle.get(HeaderMap::new).unwrap() as *const Client;
        let second = handle
            .get(|| panic!("client must be built only once"))
            .unwrap() as *const Client;
        assert_eq!(first, second);
    }

    #[test]
    fn test_done_once() {
        let mut done = false;
        assert_eq!(done_once(&mut done, StopReason::EndTurn).len(), 1);
        assert!(done_once(&mut done, StopReason::EndTurn).is_empty());
    }
}

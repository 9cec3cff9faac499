//! The uniform result shape every completion call returns.

use crate::chunk::Chunk;
use crate::error::ProviderError;
use crate::types::{ProviderContent, Response};
use futures::stream::{self, Stream, StreamExt};
use pin_project::pin_project;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

/// Stream of internal chunks handed to callers.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Chunk> + Send>>;

/// Stream of chunks as produced by a vendor client, before failures are
/// folded into error chunks.
pub type RawChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, ProviderError>> + Send>>;

/// Handle used to abort an in-flight call.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Streams observing this handle end without an
    /// error chunk and their HTTP connection is dropped.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// A handle that is cancelled with this one but can also be cancelled alone.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }
}

/// Race `fut` against an optional cancel handle.
pub async fn run_cancellable<T, F>(cancel: Option<&CancelHandle>, fut: F) -> Result<T, ProviderError>
where
    F: std::future::Future<Output = Result<T, ProviderError>>,
{
    match cancel {
        Some(handle) => {
            tokio::select! {
                biased;
                _ = handle.cancelled() => Err(ProviderError::Cancelled),
                out = fut => out,
            }
        }
        None => fut.await,
    }
}

/// Result of one completion call, regardless of vendor or streaming mode.
pub struct CompletionsResult {
    /// Vendor-native buffered response, when the call was not streamed.
    pub raw_output: Option<serde_json::Value>,
    /// Single-consumption chunk sequence.
    pub stream: ChunkStream,
    pub cancel: Option<CancelHandle>,
    text: Arc<Mutex<String>>,
}

impl CompletionsResult {
    /// Wrap a live stream. Text deltas are collected as the caller consumes it.
    pub fn streaming(stream: ChunkStream, cancel: Option<CancelHandle>) -> Self {
        let text = Arc::new(Mutex::new(String::new()));
        let stream = TextCollector {
            inner: stream,
            text: Arc::clone(&text),
        };
        Self {
            raw_output: None,
            stream: Box::pin(stream),
            cancel,
            text,
        }
    }

    /// Replay a buffered response as chunks.
    pub fn buffered(raw: serde_json::Value, response: &Response) -> Self {
        let mut chunks: Vec<Chunk> = response
            .content
            .iter()
            .filter_map(|block| match block {
                ProviderContent::Text { text } => Some(Chunk::text(text.clone())),
                ProviderContent::ToolCall {
                    id,
                    name,
                    arguments,
                } => Some(Chunk::ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                _ => None,
            })
            .collect();
        chunks.push(Chunk::Usage {
            usage: response.usage.clone(),
        });
        chunks.push(Chunk::Done {
            reason: response.stop_reason.clone(),
        });

        Self {
            raw_output: Some(raw),
            stream: stream::iter(chunks).boxed(),
            cancel: None,
            text: Arc::new(Mutex::new(response.text())),
        }
    }

    /// A result whose stream yields exactly one error chunk and ends.
    pub fn from_error(error: &ProviderError) -> Self {
        Self {
            raw_output: None,
            stream: stream::iter(vec![Chunk::from(error)]).boxed(),
            cancel: None,
            text: Arc::new(Mutex::new(String::new())),
        }
    }

    /// A result for a cancelled call: no chunks, no text.
    pub fn cancelled() -> Self {
        Self {
            raw_output: None,
            stream: stream::empty().boxed(),
            cancel: None,
            text: Arc::new(Mutex::new(String::new())),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Text assembled so far; the complete text once the stream is drained.
    pub fn text(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the stream and return every chunk.
    pub async fn collect_chunks(&mut self) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.stream.next().await {
            chunks.push(chunk);
        }
        chunks
    }

    /// Drain the stream and return the assembled text.
    pub async fn collect_text(&mut self) -> String {
        while self.stream.next().await.is_some() {}
        self.text()
    }
}

impl std::fmt::Debug for CompletionsResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionsResult")
            .field("raw_output", &self.raw_output.is_some())
            .field("cancel", &self.cancel.is_some())
            .field("text", &self.text())
            .finish()
    }
}

/// Fold a vendor stream into a chunk stream.
///
/// Ends silently on cancellation. Any other failure is turned into one last
/// chunk by `on_error` (if it returns one) and ends the stream.
pub fn guard_stream<F>(mut raw: RawChunkStream, cancel: CancelHandle, on_error: F) -> ChunkStream
where
    F: Fn(ProviderError) -> Option<Chunk> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = raw.next() => item,
            };
            match next {
                None => break,
                Some(Ok(chunk)) => yield chunk,
                Some(Err(ProviderError::Cancelled)) => break,
                Some(Err(error)) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if let Some(chunk) = on_error(error) {
                        yield chunk;
                    }
                    break;
                }
            }
        }
    })
}

#[pin_project]
struct TextCollector<S> {
    #[pin]
    inner: S,
    text: Arc<Mutex<String>>,
}

impl<S: Stream<Item = Chunk>> Stream for TextCollector<S> {
    type Item = Chunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        let this = self.project();
        let polled = this.inner.poll_next(cx);
        if let Poll::Ready(Some(Chunk::TextDelta { text })) = &polled {
            this.text
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_str(text);
        }
        polled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StopReason, Usage};

    #[tokio::test]
    async fn test_streaming_collects_text() {
        let chunks = vec![
            Chunk::text("Hel"),
            Chunk::text("lo"),
            Chunk::Done {
                reason: StopReason::EndTurn,
            },
        ];
        let mut result = CompletionsResult::streaming(stream::iter(chunks).boxed(), None);
        assert_eq!(result.text(), "");
        assert_eq!(result.collect_text().await, "Hello");
        assert_eq!(result.text(), "Hello");
    }

    #[tokio::test]
    async fn test_buffered_replays_content() {
        let response = Response {
            content: vec![ProviderContent::Text {
                text: "hi".to_string(),
            }],
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 3,
                output_tokens: 1,
            },
        };
        let mut result = CompletionsResult::buffered(serde_json::json!({"id": "x"}), &response);
        assert_eq!(result.text(), "hi");
        let chunks = result.collect_chunks().await;
        assert_eq!(chunks.len(), 3);
        assert!(matches!(chunks.last(), Some(Chunk::Done { .. })));
        // Buffered text is not counted twice.
        assert_eq!(result.text(), "hi");
    }

    #[tokio::test]
    async fn test_from_error_single_chunk() {
        let mut result = CompletionsResult::from_error(&ProviderError::StreamError("x".to_string()));
        assert!(result.raw_output.is_none());
        let chunks = result.collect_chunks().await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_error());
        assert_eq!(result.text(), "");
    }

    #[tokio::test]
    async fn test_guard_stream_folds_error() {
        let raw: RawChunkStream = stream::iter(vec![
            Ok(Chunk::text("a")),
            Err(ProviderError::StreamError("boom".to_string())),
            Ok(Chunk::text("never")),
        ])
        .boxed();
        let guarded = guard_stream(raw, CancelHandle::new(), |e| Some(Chunk::from(&e)));
        let chunks: Vec<Chunk> = guarded.collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_error());
    }

    #[tokio::test]
    async fn test_guard_stream_stops_on_cancel() {
        let cancel = CancelHandle::new();
        let raw: RawChunkStream = stream::pending().boxed();
        let mut guarded = guard_stream(raw, cancel.clone(), |e| Some(Chunk::from(&e)));
        cancel.cancel();
        assert!(guarded.next().await.is_none());
    }

    #[tokio::test]
    async fn test_run_cancellable() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let out: Result<(), ProviderError> =
            run_cancellable(Some(&cancel), futures::future::pending()).await;
        assert!(matches!(out, Err(ProviderError::Cancelled)));

        let out = run_cancellable(None, async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }
}

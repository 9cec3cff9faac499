use super::{CompletionsFn, CompletionsMiddleware};
use crate::context::CompletionsContext;
use futures::FutureExt;
use prism_provider::CompletionRequest;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Opens a span per call and logs how long dispatch took.
///
/// For streamed calls the time covers connecting, not draining the stream.
pub struct LoggingMiddleware;

impl CompletionsMiddleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }

    fn wrap(&self, next: CompletionsFn) -> CompletionsFn {
        Arc::new(move |ctx: CompletionsContext, request: CompletionRequest| {
            let next = Arc::clone(&next);
            let span = tracing::info_span!(
                "completions",
                provider = %ctx.provider.id,
                model = %request.model,
                stream = request.stream,
            );
            async move {
                let started = Instant::now();
                tracing::debug!(messages = request.messages.len(), "Dispatching completions call");
                let out = next(ctx, request).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match &out {
                    Ok(result) => tracing::debug!(
                        elapsed_ms,
                        buffered = result.raw_output.is_some(),
                        "Completions call dispatched"
                    ),
                    Err(e) => tracing::debug!(elapsed_ms, error = %e, "Completions call failed"),
                }
                out
            }
            .instrument(span)
            .boxed()
        })
    }
}

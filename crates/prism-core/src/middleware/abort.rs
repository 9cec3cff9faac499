use super::{CompletionsFn, CompletionsMiddleware};
use crate::context::CompletionsContext;
use futures::FutureExt;
use prism_provider::{CompletionRequest, CompletionsResult};
use std::sync::Arc;

/// Short-circuits calls cancelled before dispatch and hands the call's
/// cancel handle to the caller through the result.
pub struct AbortMiddleware;

impl CompletionsMiddleware for AbortMiddleware {
    fn name(&self) -> &'static str {
        "AbortMiddleware"
    }

    fn wrap(&self, next: CompletionsFn) -> CompletionsFn {
        Arc::new(move |ctx: CompletionsContext, request: CompletionRequest| {
            let next = Arc::clone(&next);
            async move {
                if ctx.cancel.is_cancelled() {
                    tracing::debug!(provider = %ctx.provider.id, "Call cancelled before dispatch");
                    return Ok(CompletionsResult::cancelled());
                }
                let cancel = ctx.cancel.clone();
                let result = next(ctx, request).await?;
                Ok(result.with_cancel(cancel))
            }
            .boxed()
        })
    }
}

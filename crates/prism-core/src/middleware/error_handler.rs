use super::{CompletionsFn, CompletionsMiddleware};
use crate::context::CompletionsContext;
use futures::FutureExt;
use prism_provider::{CompletionRequest, CompletionsResult, ProviderError};
use std::sync::Arc;

/// The failure boundary of a completions call.
///
/// Every failure below this middleware ends in one of three ways:
/// cancellation becomes an empty result, a capability error is returned
/// as-is, and anything else is classified, reported to `on_error`, then
/// either returned (`should_throw`) or replaced by a result whose stream
/// carries exactly one error chunk.
pub struct ErrorHandlerMiddleware;

impl CompletionsMiddleware for ErrorHandlerMiddleware {
    fn name(&self) -> &'static str {
        "ErrorHandlerMiddleware"
    }

    fn wrap(&self, next: CompletionsFn) -> CompletionsFn {
        Arc::new(move |ctx: CompletionsContext, request: CompletionRequest| {
            let next = Arc::clone(&next);
            async move {
                let outcome = match ctx.fault {
                    Some(ref fault) => {
                        tracing::debug!(%fault, provider = %ctx.provider.id, "Raising simulated fault");
                        Err(fault.to_error())
                    }
                    None => next(ctx.clone(), request).await,
                };

                let error = match outcome {
                    Ok(result) => return Ok(result),
                    Err(e) => e,
                };

                if error.is_cancelled() || ctx.cancel.is_cancelled() {
                    tracing::debug!(provider = %ctx.provider.id, "Call cancelled");
                    return Ok(CompletionsResult::cancelled());
                }
                if let ProviderError::CapabilityUnsupported { .. } = error {
                    return Err(error);
                }

                let error = ctx.classify(error);
                tracing::error!(
                    provider = %ctx.provider.id,
                    model = %ctx.model.id,
                    status = ?error.status(),
                    error = %error,
                    "Completions call failed"
                );
                ctx.report(&error);

                if ctx.should_throw {
                    Err(error)
                } else {
                    Ok(CompletionsResult::from_error(&error))
                }
            }
            .boxed()
        })
    }
}

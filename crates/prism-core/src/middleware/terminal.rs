use super::CompletionsFn;
use crate::context::CompletionsContext;
use futures::FutureExt;
use prism_provider::result::guard_stream;
use prism_provider::{
    ApiClient, Chunk, CompletionOptions, CompletionRequest, CompletionsResult, SdkOutput,
};
use std::sync::Arc;

/// The innermost handler: call the vendor client and wrap its output.
///
/// Failures inside a stream are classified and reported like dispatch
/// failures, then end the stream as a single error chunk.
pub fn terminal(client: Arc<dyn ApiClient>) -> CompletionsFn {
    Arc::new(move |ctx: CompletionsContext, request: CompletionRequest| {
        let client = Arc::clone(&client);
        async move {
            let options = CompletionOptions {
                cancel: Some(ctx.cancel.clone()),
            };
            match client.create_completions(request, options).await? {
                SdkOutput::Buffered { raw, response } => Ok(CompletionsResult::buffered(raw, &response)),
                SdkOutput::Stream(raw) => {
                    let cancel = ctx.cancel.clone();
                    let stream = guard_stream(raw, cancel.clone(), move |error| {
                        let error = ctx.classify(error);
                        tracing::error!(provider = %ctx.provider.id, error = %error, "Stream failed");
                        ctx.report(&error);
                        Some(Chunk::from(&error))
                    });
                    Ok(CompletionsResult::streaming(stream, Some(cancel)))
                }
            }
        }
        .boxed()
    })
}

//! Completions middleware pipeline.
//!
//! A middleware turns a `next` handler into a handler of the same shape.
//! The first middleware registered is the outermost; the innermost handler
//! is the [`terminal`] that calls the vendor client.

mod abort;
mod error_handler;
mod logging;
mod terminal;

pub use abort::AbortMiddleware;
pub use error_handler::ErrorHandlerMiddleware;
pub use logging::LoggingMiddleware;
pub use terminal::terminal;

use crate::context::CompletionsContext;
use futures::future::BoxFuture;
use prism_provider::{ApiClient, CompletionRequest, CompletionsResult, ProviderError};
use std::sync::Arc;

pub type CompletionsFuture = BoxFuture<'static, Result<CompletionsResult, ProviderError>>;

/// A completions handler.
pub type CompletionsFn =
    Arc<dyn Fn(CompletionsContext, CompletionRequest) -> CompletionsFuture + Send + Sync>;

pub trait CompletionsMiddleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn wrap(&self, next: CompletionsFn) -> CompletionsFn;
}

/// An ordered list of middlewares.
#[derive(Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<Arc<dyn CompletionsMiddleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logging, then error handling, then abort handling.
    pub fn standard() -> Self {
        Self::new()
            .with(LoggingMiddleware)
            .with(ErrorHandlerMiddleware)
            .with(AbortMiddleware)
    }

    /// Append a middleware inside the ones already registered.
    pub fn with(mut self, middleware: impl CompletionsMiddleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Compose the middlewares around `handler`.
    pub fn build(&self, handler: CompletionsFn) -> CompletionsFn {
        self.middlewares
            .iter()
            .rev()
            .fold(handler, |next, middleware| middleware.wrap(next))
    }

    /// Run one call through the pipeline against `client`.
    pub async fn execute(
        &self,
        client: Arc<dyn ApiClient>,
        ctx: CompletionsContext,
        request: CompletionRequest,
    ) -> Result<CompletionsResult, ProviderError> {
        let handler = self.build(terminal(client));
        handler(ctx, request).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

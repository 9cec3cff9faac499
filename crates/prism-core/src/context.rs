//! Per-call state threaded through the middleware chain.

use crate::classifier::classify;
use crate::fault::SimulatedFault;
use prism_provider::{CancelHandle, Model, Provider, ProviderError};
use std::fmt;
use std::sync::Arc;

/// Invoked with the (classified) error of a failed call.
pub type ErrorCallback = Arc<dyn Fn(&ProviderError) + Send + Sync>;

/// Scratch data for one completion call.
#[derive(Clone)]
pub struct CompletionsContext {
    pub provider: Provider,
    pub model: Model,
    /// Image-generation calls skip error classification.
    pub enable_generate_image: bool,
    /// Return failures as `Err` instead of an error chunk.
    pub should_throw: bool,
    pub on_error: Option<ErrorCallback>,
    pub cancel: CancelHandle,
    /// Raised inside the error boundary instead of calling the vendor.
    pub fault: Option<SimulatedFault>,
}

impl CompletionsContext {
    pub fn new(provider: Provider, model: Model) -> Self {
        Self {
            provider,
            model,
            enable_generate_image: false,
            should_throw: false,
            on_error: None,
            cancel: CancelHandle::new(),
            fault: None,
        }
    }

    pub fn throwing(mut self, should_throw: bool) -> Self {
        self.should_throw = should_throw;
        self
    }

    pub fn image_mode(mut self, enabled: bool) -> Self {
        self.enable_generate_image = enabled;
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&ProviderError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_fault(mut self, fault: Option<SimulatedFault>) -> Self {
        self.fault = fault;
        self
    }

    /// Classify an error for this call's provider, unless in image mode.
    pub fn classify(&self, error: ProviderError) -> ProviderError {
        if self.enable_generate_image {
            error
        } else {
            classify(error, &self.provider)
        }
    }

    pub(crate) fn report(&self, error: &ProviderError) {
        if let Some(ref callback) = self.on_error {
            callback(error);
        }
    }
}

impl fmt::Debug for CompletionsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionsContext")
            .field("provider", &self.provider.id)
            .field("model", &self.model.id)
            .field("enable_generate_image", &self.enable_generate_image)
            .field("should_throw", &self.should_throw)
            .field("on_error", &self.on_error.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("fault", &self.fault)
            .finish()
    }
}

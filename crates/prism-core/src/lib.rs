//! prism-core: completion pipeline, error classification, and configuration.

pub mod classifier;
pub mod config;
pub mod context;
mod error;
pub mod fault;
pub mod middleware;
pub mod painting;

pub use classifier::{classify, profile_for, VendorErrorProfile};
pub use config::{api_key_env_var, api_key_for, Config, ConfigStore};
pub use context::{CompletionsContext, ErrorCallback};
pub use error::ConfigError;
pub use fault::SimulatedFault;
pub use middleware::{
    AbortMiddleware, CompletionsFn, CompletionsFuture, CompletionsMiddleware,
    ErrorHandlerMiddleware, LoggingMiddleware, Pipeline,
};
pub use painting::generate_images;

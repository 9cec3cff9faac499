//! Subcommand implementations.

pub mod complete;
pub mod image;
pub mod models;
pub mod providers;

use crate::cli::Cli;
use prism_core::{api_key_env_var, Config, ConfigError, SimulatedFault};
use prism_provider::{Model, Provider};

/// Provider, model and error-mode choices shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub throw: bool,
    pub fault: Option<SimulatedFault>,
}

impl Selection {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            provider: cli.provider.clone(),
            model: cli.model.clone(),
            throw: cli.throw,
            fault: cli
                .fault
                .as_deref()
                .filter(|f| !f.trim().is_empty())
                .and_then(|f| f.parse().ok()),
        }
    }
}

/// The selected provider with its key resolved from config or environment.
pub fn resolve_provider(config: &Config, selection: &Selection) -> anyhow::Result<Provider> {
    let id = selection
        .provider
        .as_deref()
        .unwrap_or(&config.default_provider);
    config.resolve_provider(id).map_err(|e| match e {
        ConfigError::UnknownProvider(id) => {
            let available: Vec<&str> = config.providers.iter().map(|p| p.id.as_str()).collect();
            anyhow::anyhow!("Unknown provider: {id}. Available: {}", available.join(", "))
        }
        other => anyhow::anyhow!("{other}"),
    })
}

/// The selected model, falling back to the config default and then to the
/// provider's first model.
pub fn resolve_model(config: &Config, provider: &Provider, selection: &Selection) -> anyhow::Result<Model> {
    let id = match selection.model {
        Some(ref id) => id.clone(),
        None if provider.id == config.default_provider => config.default_model.clone(),
        None => provider
            .models
            .first()
            .map(|m| m.id.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Provider {} has no models configured. Pass one with --model",
                    provider.id
                )
            })?,
    };
    Ok(provider.model_or_default(&id))
}

/// Fail early with setup instructions when the provider has no key.
pub fn require_api_key(provider: &Provider) -> anyhow::Result<()> {
    if provider.has_api_key() {
        return Ok(());
    }
    let var = api_key_env_var(&provider.id);
    Err(anyhow::anyhow!(
        "{var} not set. Set it with:\n  \
         export {var}=your-key-here"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(provider: Option<&str>, model: Option<&str>) -> Selection {
        Selection {
            provider: provider.map(str::to_string),
            model: model.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_provider_and_model() {
        let config = Config::default();
        let sel = selection(None, None);
        let provider = resolve_provider(&config, &sel).unwrap();
        assert_eq!(provider.id, "openai");
        assert_eq!(resolve_model(&config, &provider, &sel).unwrap().id, "gpt-4o-mini");
    }

    #[test]
    fn test_non_default_provider_uses_first_model() {
        let config = Config::default();
        let sel = selection(Some("zhipu"), None);
        let provider = resolve_provider(&config, &sel).unwrap();
        let model = resolve_model(&config, &provider, &sel).unwrap();
        assert_eq!(model.id, "glm-4.5");
        assert_eq!(model.provider, "zhipu");
    }

    #[test]
    fn test_explicit_unknown_model_is_bound_to_provider() {
        let config = Config::default();
        let sel = selection(Some("anthropic"), Some("claude-next"));
        let provider = resolve_provider(&config, &sel).unwrap();
        let model = resolve_model(&config, &provider, &sel).unwrap();
        assert_eq!(model.id, "claude-next");
        assert_eq!(model.provider, "anthropic");
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let err = resolve_provider(&Config::default(), &selection(Some("nope"), None)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Unknown provider: nope"));
        assert!(msg.contains("zhipu"));
    }

    #[test]
    fn test_require_api_key_message() {
        let provider = Provider::new("my-vendor", "openai", "");
        let err = require_api_key(&provider).unwrap_err();
        assert!(err.to_string().starts_with("MY_VENDOR_API_KEY not set"));
        assert!(require_api_key(&provider.with_api_key("k")).is_ok());
    }
}

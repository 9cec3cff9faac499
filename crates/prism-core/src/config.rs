use crate::error::ConfigError;
use prism_provider::providers::zhipu::ZHIPU_API_HOST;
use prism_provider::{Model, Provider};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Serialized settings from ~/.prism/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_provider: String,
    pub default_model: String,
    pub providers: Vec<Provider>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            default_model: "gpt-4o-mini".to_string(),
            providers: default_providers(),
        }
    }
}

impl Config {
    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// The provider with this id, its key filled from the environment when
    /// the stored one is blank.
    pub fn resolve_provider(&self, id: &str) -> Result<Provider, ConfigError> {
        let mut provider = self
            .provider(id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProvider(id.to_string()))?;
        provider.api_key = api_key_for(&provider);
        Ok(provider)
    }
}

fn default_providers() -> Vec<Provider> {
    vec![
        Provider::new("openai", "openai", "https://api.openai.com").with_models(vec![
            Model::new("gpt-4o", "openai").with_name("GPT-4o"),
            Model::new("gpt-4o-mini", "openai").with_name("GPT-4o mini"),
            Model::new("text-embedding-3-small", "openai"),
        ]),
        Provider::new("anthropic", "anthropic", "https://api.anthropic.com").with_models(vec![
            Model::new("claude-sonnet-4-20250514", "anthropic").with_name("Claude Sonnet 4"),
            Model::new("claude-3-5-haiku-latest", "anthropic").with_name("Claude 3.5 Haiku"),
        ]),
        Provider::new("gemini", "gemini", "https://generativelanguage.googleapis.com").with_models(
            vec![
                Model::new("gemini-2.5-flash", "gemini").with_name("Gemini 2.5 Flash"),
                Model::new("gemini-2.5-pro", "gemini").with_name("Gemini 2.5 Pro"),
            ],
        ),
        Provider::new("zhipu", "openai", ZHIPU_API_HOST).with_models(vec![
            Model::new("glm-4.5", "zhipu").with_name("GLM-4.5"),
            Model::new("glm-4.5-flash", "zhipu").with_name("GLM-4.5-Flash").free(),
            Model::new("cogview-3-flash", "zhipu").with_name("CogView-3-Flash").free(),
        ]),
    ]
}

/// Environment variable consulted for a provider's key: `<ID>_API_KEY`,
/// with `-` mapped to `_`.
pub fn api_key_env_var(provider_id: &str) -> String {
    format!("{}_API_KEY", provider_id.to_uppercase().replace('-', "_"))
}

/// The stored key, or the environment's when the stored one is blank.
pub fn api_key_for(provider: &Provider) -> String {
    if provider.has_api_key() {
        return provider.api_key.clone();
    }
    std::env::var(api_key_env_var(&provider.id)).unwrap_or_default()
}

/// Helper struct for storing the location to read/write global settings
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".prism");
        path.push("config.json");
        Self { path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the user's saved config, or fallback to Default
    pub fn load(&self) -> Config {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Config::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable config");
                Config::default()
            }
        }
    }

    /// Save the user's config back to disk
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Export stored keys as `<ID>_API_KEY`, without overwriting the process env
    pub fn hydrate_env(&self) {
        let config = self.load();
        for provider in config.providers.iter().filter(|p| p.has_api_key()) {
            let env_var = api_key_env_var(&provider.id);
            if std::env::var(&env_var).is_err() {
                std::env::set_var(&env_var, provider.api_key.trim());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_provider::ProviderType;

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let legacy = r#"{ "default_provider": "anthropic" }"#;
        let parsed: Config = serde_json::from_str(legacy).unwrap();
        assert_eq!(parsed.default_provider, "anthropic");
        assert_eq!(parsed.default_model, "gpt-4o-mini");
        assert_eq!(parsed.providers.len(), 4);
    }

    #[test]
    fn test_provider_descriptor_is_camel_case() {
        let json = r#"{
            "providers": [{
                "id": "deepseek",
                "type": "openai",
                "apiHost": "https://api.deepseek.com",
                "apiKey": "sk-1",
                "enabled": true,
                "models": [{"id": "deepseek-chat", "name": "DeepSeek", "provider": "deepseek"}]
            }]
        }"#;
        let parsed: Config = serde_json::from_str(json).unwrap();
        let provider = parsed.provider("deepseek").unwrap();
        assert_eq!(provider.kind, ProviderType::OpenAi);
        assert_eq!(provider.api_host, "https://api.deepseek.com");
        assert_eq!(provider.models[0].id, "deepseek-chat");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("nested").join("config.json"));

        let mut config = Config::default();
        config.default_provider = "zhipu".to_string();
        config.providers[0].api_key = "sk-saved".to_string();
        store.save(&config).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.default_provider, "zhipu");
        assert_eq!(loaded.provider("openai").unwrap().api_key, "sk-saved");
    }

    #[test]
    fn test_unreadable_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let loaded = ConfigStore::with_path(&path).load();
        assert_eq!(loaded.providers.len(), 4);
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(api_key_env_var("zhipu"), "ZHIPU_API_KEY");
        assert_eq!(api_key_env_var("new-api"), "NEW_API_API_KEY");
    }

    #[test]
    fn test_api_key_prefers_stored_then_env() {
        let stored = Provider::new("prism-test-stored", "openai", "").with_api_key("sk-stored");
        assert_eq!(api_key_for(&stored), "sk-stored");

        std::env::set_var("PRISM_TEST_ENV_API_KEY", "sk-env");
        let blank = Provider::new("prism-test-env", "openai", "").with_api_key("  ");
        assert_eq!(api_key_for(&blank), "sk-env");

        let config = Config {
            providers: vec![blank],
            ..Config::default()
        };
        assert_eq!(config.resolve_provider("prism-test-env").unwrap().api_key, "sk-env");
        assert!(matches!(
            config.resolve_provider("missing"),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_hydrate_env_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("config.json"));
        let config = Config {
            providers: vec![
                Provider::new("prism-hydrate-a", "openai", "").with_api_key("from-file"),
                Provider::new("prism-hydrate-b", "openai", "").with_api_key("from-file"),
            ],
            ..Config::default()
        };
        store.save(&config).unwrap();

        std::env::set_var("PRISM_HYDRATE_B_API_KEY", "from-env");
        store.hydrate_env();
        assert_eq!(std::env::var("PRISM_HYDRATE_A_API_KEY").unwrap(), "from-file");
        assert_eq!(std::env::var("PRISM_HYDRATE_B_API_KEY").unwrap(), "from-env");
    }
}

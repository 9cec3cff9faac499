//! `prism models`: list configured or vendor-reported models.

use super::{require_api_key, resolve_provider, Selection};
use prism_core::Config;
use prism_provider::{create_client, Model, ModelInfo};

pub async fn run(config: &Config, selection: &Selection, remote: bool) -> anyhow::Result<()> {
    let provider = resolve_provider(config, selection)?;

    if !remote {
        if provider.models.is_empty() {
            println!("No models configured for {}.", provider.id);
        }
        for model in &provider.models {
            println!("{}", configured_line(model));
        }
        return Ok(());
    }

    require_api_key(&provider)?;
    let client = create_client(&provider);
    let models = client
        .list_models()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list models for {}: {e}", provider.id))?;
    for info in &models {
        println!("{}", remote_line(info));
    }
    Ok(())
}

fn configured_line(model: &Model) -> String {
    let mut line = model.id.clone();
    if !model.name.is_empty() && model.name != model.id {
        line.push_str(&format!(" ({})", model.name));
    }
    if model.free {
        line.push_str(" [free]");
    }
    line
}

fn remote_line(info: &ModelInfo) -> String {
    match info.owned_by {
        Some(ref owner) => format!("{} | {owner}", info.id),
        None => info.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_line() {
        let model = Model::new("glm-4.5-flash", "zhipu").with_name("GLM-4.5-Flash").free();
        assert_eq!(configured_line(&model), "glm-4.5-flash (GLM-4.5-Flash) [free]");
        assert_eq!(configured_line(&Model::new("gpt-4o", "openai")), "gpt-4o");
    }

    #[test]
    fn test_remote_line() {
        let mut info = ModelInfo::new("gpt-4o");
        assert_eq!(remote_line(&info), "gpt-4o");
        info.owned_by = Some("openai".to_string());
        assert_eq!(remote_line(&info), "gpt-4o | openai");
    }
}

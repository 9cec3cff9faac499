//! `prism providers`: show each configured provider and its client.

use prism_core::{api_key_for, Config};
use prism_provider::{resolve, Capability, ClientKind, Provider};

pub fn run(config: &Config) -> anyhow::Result<()> {
    if config.providers.is_empty() {
        println!("No providers configured.");
        return Ok(());
    }
    for provider in &config.providers {
        println!("{}", describe(provider, resolve(provider)));
    }
    Ok(())
}

fn describe(provider: &Provider, kind: ClientKind) -> String {
    let client = prism_provider::create_client(provider);
    let capabilities: Vec<&str> = Capability::ALL
        .iter()
        .filter(|c| client.supports(**c))
        .map(|c| c.as_str())
        .collect();
    let key = if api_key_for(provider).trim().is_empty() {
        "no key"
    } else {
        "key set"
    };
    let state = if provider.enabled { "enabled" } else { "disabled" };
    format!(
        "{} | {} | {} | {} | {} | {}",
        provider.id,
        provider.kind.as_str(),
        kind,
        state,
        key,
        capabilities.join(",")
    )
}

//! prism: talk to any configured AI provider from the terminal.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use prism_core::ConfigStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging before anything that may warn
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("prism=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let config_store = match cli.config {
        Some(ref path) => ConfigStore::with_path(path),
        None => ConfigStore::new(),
    };
    config_store.hydrate_env();
    let config = config_store.load();

    let selection = commands::Selection::from_cli(&cli);
    match cli.command {
        Commands::Providers => commands::providers::run(&config)?,
        Commands::Models { remote } => commands::models::run(&config, &selection, remote).await?,
        Commands::Complete {
            ref prompt,
            ref system,
            max_tokens,
            no_stream,
            json,
        } => {
            let options = commands::complete::CompleteOptions {
                system: system.clone(),
                max_tokens,
                stream: !no_stream,
                json,
            };
            commands::complete::run(&config, &selection, prompt, options).await?;
        }
        Commands::Image {
            ref prompt,
            ref size,
            count,
            ref quality,
        } => {
            let options = commands::image::ImageOptions {
                size: size.clone(),
                count,
                quality: quality.clone(),
            };
            commands::image::run(&config, &selection, prompt, options).await?;
        }
    }

    Ok(())
}

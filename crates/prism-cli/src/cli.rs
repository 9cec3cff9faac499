//! CLI argument and command definitions.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "prism", version, about = "One interface over many AI providers")]
pub struct Cli {
    /// Provider id from the config (defaults to the configured default).
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model to use (defaults to the configured default model).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Fail with the classified error instead of printing it as a chunk.
    #[arg(long, global = true)]
    pub throw: bool,

    /// Simulate a vendor failure: no_api_key, insufficient_balance, quota_exceeded.
    #[arg(long, global = true, env = "PRISM_SIMULATE_FAULT")]
    pub fault: Option<String>,

    /// Config file path.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured providers and the client each one uses.
    Providers,

    /// List models of the selected provider.
    Models {
        /// Ask the vendor instead of reading the config.
        #[arg(long)]
        remote: bool,
    },

    /// Send a single prompt and print the completion.
    Complete {
        /// The prompt to send.
        prompt: String,

        /// System prompt.
        #[arg(long)]
        system: Option<String>,

        /// Maximum tokens to generate.
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Wait for the full response instead of streaming.
        #[arg(long)]
        no_stream: bool,

        /// Print every chunk as a JSON line.
        #[arg(long)]
        json: bool,
    },

    /// Generate images and print their URLs.
    Image {
        /// The prompt describing the image.
        prompt: String,

        /// Image size, WIDTHxHEIGHT.
        #[arg(long, default_value = "1024x1024")]
        size: String,

        /// Number of images.
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Quality preset.
        #[arg(long)]
        quality: Option<String>,
    },
}

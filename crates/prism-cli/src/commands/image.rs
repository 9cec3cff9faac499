//! `prism image`: generate images with the selected provider.

use super::{resolve_model, resolve_provider, Selection};
use prism_core::{classify, generate_images, Config};
use prism_provider::{CancelHandle, ImageParams};

/// `prism image` generation options.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub size: String,
    pub count: u32,
    pub quality: Option<String>,
}

pub async fn run(
    config: &Config,
    selection: &Selection,
    prompt: &str,
    options: ImageOptions,
) -> anyhow::Result<()> {
    let provider = resolve_provider(config, selection)?;
    let model = resolve_model(config, &provider, selection)?;

    let cancel = CancelHandle::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut params = ImageParams::new(&model.id, prompt);
    params.image_size = options.size;
    params.batch_size = options.count.max(1);
    params.quality = options.quality;
    params.cancel = Some(cancel.clone());

    let outcome = generate_images(&provider, params).await;
    ctrl_c.abort();

    let urls = outcome.map_err(|e| anyhow::anyhow!("{}", classify(e, &provider)))?;
    if cancel.is_cancelled() {
        eprintln!("Cancelled.");
        return Ok(());
    }
    if urls.is_empty() {
        println!("No images returned.");
    }
    for url in &urls {
        println!("{url}");
    }
    Ok(())
}

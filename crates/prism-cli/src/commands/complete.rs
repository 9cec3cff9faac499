//! `prism complete`: one prompt through the completions pipeline.

use super::{resolve_model, resolve_provider, Selection};
use futures::StreamExt;
use prism_core::{CompletionsContext, Config, Pipeline};
use prism_provider::{
    create_client, ApiClient, CancelHandle, Chunk, CompletionRequest, ProviderMessage,
};
use std::io::Write;
use std::sync::Arc;

/// `prism complete` output and request options.
#[derive(Debug, Clone)]
pub struct CompleteOptions {
    pub system: Option<String>,
    pub max_tokens: Option<usize>,
    pub stream: bool,
    pub json: bool,
}

pub async fn run(
    config: &Config,
    selection: &Selection,
    prompt: &str,
    options: CompleteOptions,
) -> anyhow::Result<()> {
    let provider = resolve_provider(config, selection)?;
    if !provider.has_api_key() {
        tracing::warn!(provider = %provider.id, "No API key configured; the call will fail");
    }
    let model = resolve_model(config, &provider, selection)?;
    let client: Arc<dyn ApiClient> = Arc::from(create_client(&provider));

    let cancel = CancelHandle::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let ctx = CompletionsContext::new(provider, model.clone())
        .throwing(selection.throw)
        .with_cancel(cancel.clone())
        .with_fault(selection.fault.clone())
        .on_error(|e| tracing::debug!(error = %e, "Completion failed"));

    let request = build_request(&model.id, prompt, &options);
    let outcome = drive(client, ctx, request, options.json).await;
    ctrl_c.abort();

    if cancel.is_cancelled() {
        eprintln!("Cancelled.");
        return Ok(());
    }
    outcome
}

fn build_request(model: &str, prompt: &str, options: &CompleteOptions) -> CompletionRequest {
    let mut request = CompletionRequest::new(model, vec![ProviderMessage::user(prompt)]);
    request.system = options.system.clone();
    request.max_tokens = options.max_tokens;
    if !options.stream {
        request = request.buffered();
    }
    request
}

/// Run the call and print chunks as they arrive. Returns an error when the
/// call fails, whether it failed up front or mid-stream.
async fn drive(
    client: Arc<dyn ApiClient>,
    ctx: CompletionsContext,
    request: CompletionRequest,
    json: bool,
) -> anyhow::Result<()> {
    let mut result = Pipeline::standard()
        .execute(client, ctx, request)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut stdout = std::io::stdout();
    let mut failure = None;
    while let Some(chunk) = result.stream.next().await {
        if let Chunk::Error(ref error) = chunk {
            failure = Some(error.message.clone());
        }
        if let Some(out) = render(&chunk, json)? {
            write!(stdout, "{out}")?;
            stdout.flush()?;
        }
    }
    if !json && !result.text().is_empty() {
        writeln!(stdout)?;
    }

    match failure {
        Some(message) => Err(anyhow::anyhow!("{message}")),
        None => Ok(()),
    }
}

/// What to print for one chunk, if anything.
fn render(chunk: &Chunk, json: bool) -> anyhow::Result<Option<String>> {
    if json {
        return Ok(Some(format!("{}\n", serde_json::to_string(chunk)?)));
    }
    Ok(match chunk {
        Chunk::TextDelta { text } => Some(text.clone()),
        Chunk::ToolCall { name, arguments, .. } => Some(format!("\n[tool call] {name} {arguments}\n")),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_provider::{ChunkError, ErrorCategory, StopReason};

    fn options(stream: bool) -> CompleteOptions {
        CompleteOptions {
            system: Some("be brief".to_string()),
            max_tokens: Some(64),
            stream,
            json: false,
        }
    }

    #[test]
    fn test_build_request() {
        let request = build_request("glm-4.5", "hi", &options(true));
        assert!(request.stream);
        assert_eq!(request.model, "glm-4.5");
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert_eq!(request.max_tokens, Some(64));
        assert!(!build_request("glm-4.5", "hi", &options(false)).stream);
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(render(&Chunk::text("hey"), false).unwrap().as_deref(), Some("hey"));
        let done = Chunk::Done {
            reason: StopReason::EndTurn,
        };
        assert!(render(&done, false).unwrap().is_none());
    }

    #[test]
    fn test_render_json_error_chunk() {
        let chunk = Chunk::Error(ChunkError {
            category: ErrorCategory::Auth,
            message: "zhipu.no_api_key".to_string(),
            status: Some(401),
            code: None,
        });
        let line = render(&chunk, true).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "zhipu.no_api_key");
    }
}

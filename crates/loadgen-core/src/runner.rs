use std::sync::Arc;

use loadgen_backend::{CompletionRequest, StreamingClient};
use loadgen_common::Result;
use tokio_stream::StreamExt as _;

use crate::prompt::{Prompt, RunResult};
use crate::state::{BatchState, InFlightGuard};

/// Drives one streaming completion to its end.
///
/// Completion tokens are counted as streamed chunks: every fragment the client
/// yields adds one, whatever its length. Servers that pack several tokens into
/// one event (or send role-only and finish events) skew this count, so treat it
/// as an approximation of the true token count.
pub struct PromptRunner<C> {
    client: Arc<C>,
    model: String,
    max_tokens: usize,
}

impl<C: StreamingClient> PromptRunner<C> {
    pub fn new(client: Arc<C>, model: impl Into<String>, max_tokens: usize) -> Self {
        Self { client, model: model.into(), max_tokens }
    }

    /// Enters `prompt.index` into the in-flight set and runs the prompt.
    pub async fn run(&self, state: &Arc<BatchState>, prompt: &Prompt) -> RunResult {
        match state.enter(prompt.index) {
            Ok(guard) => self.drive(guard, prompt).await,
            Err(e) => {
                tracing::warn!(target: "runner", index = prompt.index, error = %e, "prompt not started");
                RunResult::failed()
            }
        }
    }

    /// Runs a prompt whose index is already in flight. The guard is released
    /// on every exit path, including when this future is dropped mid-stream.
    pub async fn drive(&self, mut guard: InFlightGuard, prompt: &Prompt) -> RunResult {
        let index = guard.index();
        tracing::info!(target: "runner", index, "Prompt {}: {}", index + 1, prompt.text);
        let prompt_token_count = prompt.word_count();
        match self.stream(guard.state(), prompt).await {
            Ok(chunks) => {
                guard.complete();
                RunResult::succeeded(chunks, prompt_token_count)
            }
            Err(e) if e.is_per_prompt() => {
                tracing::warn!(target: "runner", index, error = %e, "prompt failed");
                RunResult::failed()
            }
            Err(e) => {
                tracing::error!(target: "runner", index, error = %e, "prompt failed outside the request");
                RunResult::failed()
            }
        }
    }

    async fn stream(&self, state: &BatchState, prompt: &Prompt) -> Result<u64> {
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: prompt.text.clone(),
            max_tokens: self.max_tokens,
        };
        let mut chunks = self.client.open(request).await?;
        let mut count = 0u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            state.append_partial(prompt.index, &chunk);
            loadgen_obs::chunk_received();
            count += 1;
        }
        Ok(count)
    }
}

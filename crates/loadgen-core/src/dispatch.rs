use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use loadgen_backend::StreamingClient;
use loadgen_common::{LoadgenError, Result};
use tokio::task::JoinSet;

use crate::monitor::{monitor, ProgressSink};
use crate::prompt::{Prompt, RunResult};
use crate::runner::PromptRunner;
use crate::state::BatchState;

/// Fans a batch out as one task per prompt plus a detached progress monitor.
pub struct BatchDispatcher<C, S: ?Sized> {
    client: Arc<C>,
    progress: Arc<S>,
    poll_interval: Duration,
}

impl<C, S> BatchDispatcher<C, S>
where
    C: StreamingClient + 'static,
    S: ProgressSink + ?Sized,
{
    pub fn new(client: Arc<C>, progress: Arc<S>, poll_interval: Duration) -> Self {
        Self { client, progress, poll_interval }
    }

    /// Runs every prompt concurrently and returns one result per prompt, in
    /// input order. Prompt failures come back as zeroed results; the only
    /// error is a batch that reuses an index.
    pub async fn dispatch(&self, model: &str, prompts: Vec<Prompt>, max_tokens: usize) -> Result<Vec<RunResult>> {
        let mut seen = HashSet::with_capacity(prompts.len());
        if let Some(dup) = prompts.iter().find(|p| !seen.insert(p.index)) {
            return Err(LoadgenError::DuplicateIndex(dup.index));
        }

        let state = BatchState::new();
        let runner = Arc::new(PromptRunner::new(self.client.clone(), model, max_tokens));
        let total = prompts.len();
        let mut tasks = JoinSet::new();
        for (position, prompt) in prompts.into_iter().enumerate() {
            // entered here so the monitor never sees a spawned-but-absent runner
            let guard = state.enter(prompt.index)?;
            let runner = runner.clone();
            tasks.spawn(async move { (position, runner.drive(guard, &prompt).await) });
        }
        tokio::spawn(monitor(state.clone(), self.progress.clone(), self.poll_interval));
        tracing::debug!(target: "dispatch", total, "batch launched");

        let mut results = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => results[position] = Some(result),
                Err(e) => tracing::error!(target: "dispatch", error = %e, "prompt task did not finish"),
            }
        }
        debug_assert!(state.is_idle());
        Ok(results.into_iter().map(|r| r.unwrap_or_else(RunResult::failed)).collect())
    }
}

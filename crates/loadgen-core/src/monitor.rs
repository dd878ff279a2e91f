use std::sync::Arc;
use std::time::Duration;

use crate::state::{BatchState, Snapshot};

/// Where the live view of a batch goes.
pub trait ProgressSink: Send + Sync + 'static {
    fn render(&self, snapshot: &Snapshot);
}

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn render(&self, _snapshot: &Snapshot) {}
}

/// Renders the in-flight prompts every `interval` until none remain.
///
/// Termination is polled, not signalled: up to one interval may pass after the
/// batch drains before this returns. Nothing waits on it.
pub async fn monitor<S: ProgressSink + ?Sized>(state: Arc<BatchState>, sink: Arc<S>, interval: Duration) {
    let mut frames = 0usize;
    loop {
        let snapshot = state.snapshot();
        if snapshot.is_empty() {
            break;
        }
        sink.render(&snapshot);
        frames += 1;
        tokio::time::sleep(interval).await;
    }
    tracing::debug!(target: "monitor", frames, "in-flight set drained");
}

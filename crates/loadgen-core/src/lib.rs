//! Concurrent batch dispatch, live progress and throughput aggregation for
//! streaming completion endpoints.

pub mod dispatch;
pub mod metrics;
pub mod monitor;
pub mod prompt;
pub mod runner;
pub mod state;
pub mod sweep;

pub use dispatch::BatchDispatcher;
pub use metrics::{aggregate, BatchReport};
pub use monitor::{monitor, NoProgress, ProgressSink};
pub use prompt::{build_prompts, Prompt, PromptSource, RandomWords, RunResult};
pub use runner::PromptRunner;
pub use state::{BatchState, InFlightGuard, RunningPrompt, Snapshot};
pub use sweep::{BatchSweepDriver, ReportSink, SweepPhase, SweepPlan};

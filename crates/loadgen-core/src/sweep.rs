//! Runs one batch per requested size, strictly one after another.

use loadgen_backend::StreamingClient;
use loadgen_common::{LoadgenError, Result};
use tokio::time::Instant;

use crate::dispatch::BatchDispatcher;
use crate::metrics::{aggregate, BatchReport};
use crate::monitor::ProgressSink;
use crate::prompt::{build_prompts, PromptSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Idle,
    Running(usize),
    Reporting(usize),
}

/// Receives each batch report as soon as it is computed.
pub trait ReportSink {
    fn emit(&mut self, report: &BatchReport) -> Result<()>;

    /// Called on every sweep state change, the final `Idle` included.
    fn phase_changed(&mut self, _phase: SweepPhase) {}
}

impl ReportSink for Vec<BatchReport> {
    fn emit(&mut self, report: &BatchReport) -> Result<()> {
        self.push(report.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub model: String,
    pub batch_sizes: Vec<usize>,
    pub num_input_words: usize,
    pub max_tokens: usize,
    pub prompt_prefix: String,
}

impl SweepPlan {
    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| LoadgenError::InvalidBatchSizes {
            input: format!("{:?}", self.batch_sizes),
            reason: reason.to_string(),
        };
        if self.batch_sizes.is_empty() {
            return Err(invalid("no batch sizes given"));
        }
        if self.batch_sizes.contains(&0) {
            return Err(invalid("batch size must be at least 1"));
        }
        Ok(())
    }
}

pub struct BatchSweepDriver<C, S: ?Sized, P, R> {
    dispatcher: BatchDispatcher<C, S>,
    source: P,
    sink: R,
    phase: SweepPhase,
}

impl<C, S, P, R> BatchSweepDriver<C, S, P, R>
where
    C: StreamingClient + 'static,
    S: ProgressSink + ?Sized,
    P: PromptSource,
    R: ReportSink,
{
    pub fn new(dispatcher: BatchDispatcher<C, S>, source: P, sink: R) -> Self {
        Self { dispatcher, source, sink, phase: SweepPhase::Idle }
    }

    pub fn phase(&self) -> SweepPhase { self.phase }

    pub fn into_sink(self) -> R { self.sink }

    /// Runs the whole plan. The first error (bad plan, dispatch, aggregation or
    /// a failed report write) aborts the sweep; later sizes are not attempted.
    /// Individual prompt failures are not errors here.
    pub async fn sweep(&mut self, plan: &SweepPlan) -> Result<Vec<BatchReport>> {
        plan.validate()?;
        let outcome = self.run_sizes(plan).await;
        self.enter_phase(SweepPhase::Idle);
        if let Err(e) = &outcome {
            tracing::error!(target: "sweep", error = %e, "sweep aborted");
        }
        outcome
    }

    async fn run_sizes(&mut self, plan: &SweepPlan) -> Result<Vec<BatchReport>> {
        let mut reports = Vec::with_capacity(plan.batch_sizes.len());
        for &batch_size in &plan.batch_sizes {
            self.enter_phase(SweepPhase::Running(batch_size));
            tracing::info!(target: "sweep", batch_size, "Batch Size: {batch_size}");
            let prompts = build_prompts(&mut self.source, &plan.prompt_prefix, batch_size, plan.num_input_words);

            let start = Instant::now();
            let results = self.dispatcher.dispatch(&plan.model, prompts, plan.max_tokens).await?;
            let elapsed = start.elapsed();
            loadgen_obs::batch_drained(elapsed.as_secs_f64());

            self.enter_phase(SweepPhase::Reporting(batch_size));
            let report = aggregate(&results, elapsed)?;
            self.sink.emit(&report)?;
            reports.push(report);
        }
        Ok(reports)
    }

    fn enter_phase(&mut self, phase: SweepPhase) {
        self.phase = phase;
        self.sink.phase_changed(phase);
    }
}

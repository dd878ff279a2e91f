use std::fmt;
use std::time::Duration;

use loadgen_common::{LoadgenError, Result};
use serde::{Serialize, Serializer};

use crate::prompt::RunResult;

/// Throughput of one batch.
///
/// Failed prompts add nothing to the token totals but still count towards
/// `batch_size`, so the per-input rates fall as failures rise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub batch_size: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "secs_f64")]
    pub elapsed: Duration,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub prompt_rate: f64,
    pub completion_rate: f64,
    pub prompt_rate_per_input: f64,
    pub completion_rate_per_input: f64,
}

fn secs_f64<S: Serializer>(d: &Duration, s: S) -> core::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Sums a finished batch and derives the four token rates.
pub fn aggregate(results: &[RunResult], elapsed: Duration) -> Result<BatchReport> {
    let batch_size = results.len();
    if batch_size == 0 {
        return Err(LoadgenError::EmptyBatch);
    }
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return Err(LoadgenError::ZeroDuration);
    }
    let failed = results.iter().filter(|r| r.failed).count();
    let total_prompt_tokens: u64 = results.iter().map(|r| r.prompt_token_count).sum();
    let total_completion_tokens: u64 = results.iter().map(|r| r.completion_token_count).sum();
    let prompt_rate = total_prompt_tokens as f64 / secs;
    let completion_rate = total_completion_tokens as f64 / secs;
    Ok(BatchReport {
        batch_size,
        succeeded: batch_size - failed,
        failed,
        elapsed,
        total_prompt_tokens,
        total_completion_tokens,
        prompt_rate,
        completion_rate,
        prompt_rate_per_input: prompt_rate / batch_size as f64,
        completion_rate_per_input: completion_rate / batch_size as f64,
    })
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Completed {} / {} requests in {:.2} seconds.", self.succeeded, self.batch_size, self.elapsed.as_secs_f64())?;
        writeln!(f, "Total Prompt Tokens: {}", self.total_prompt_tokens)?;
        writeln!(f, "Total Completion Tokens: {}", self.total_completion_tokens)?;
        writeln!(f, "Prompt rate: {:.2} tokens/second", self.prompt_rate)?;
        writeln!(f, "Prompt rate per input: {:.2} tokens/second", self.prompt_rate_per_input)?;
        writeln!(f, "Completion rate: {:.2} tokens/second", self.completion_rate)?;
        writeln!(f, "Completion rate per input: {:.2} tokens/second", self.completion_rate_per_input)?;
        write!(f, "{}", "-".repeat(20))
    }
}

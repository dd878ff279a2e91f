mod support;

use std::sync::Arc;
use std::time::Duration;

use loadgen_backend::mock::{Script, ScriptedClient};
use loadgen_common::{LoadgenError, Result};
use loadgen_core::{BatchDispatcher, BatchReport, BatchSweepDriver, NoProgress, PromptSource, RandomWords, ReportSink, SweepPhase, SweepPlan};
use support::NumberedWords;

fn plan(sizes: &[usize]) -> SweepPlan {
    SweepPlan {
        model: "test".into(),
        batch_sizes: sizes.to_vec(),
        num_input_words: 5,
        max_tokens: 16,
        prompt_prefix: "Story: ".into(),
    }
}

fn dispatcher(client: ScriptedClient) -> BatchDispatcher<ScriptedClient, NoProgress> {
    BatchDispatcher::new(Arc::new(client), Arc::new(NoProgress), Duration::from_secs(1))
}

fn slow(chunks: usize) -> Script {
    Script::chunks(vec!["t"; chunks]).with_delay(Duration::from_millis(50))
}

#[tokio::test(start_paused = true)]
async fn one_report_per_size_in_given_order() {
    let mut driver = BatchSweepDriver::new(dispatcher(ScriptedClient::new(slow(2))), RandomWords::seeded(7), Vec::<BatchReport>::new());

    let reports = driver.sweep(&plan(&[4, 1, 2])).await.unwrap();
    assert_eq!(driver.phase(), SweepPhase::Idle);
    let sizes: Vec<usize> = reports.iter().map(|r| r.batch_size).collect();
    assert_eq!(sizes, vec![4, 1, 2]);
    for r in &reports {
        // prefix is one word, plus five generated words
        assert_eq!(r.total_prompt_tokens, 6 * r.batch_size as u64);
        assert_eq!(r.total_completion_tokens, 2 * r.batch_size as u64);
    }
    assert_eq!(driver.into_sink(), reports);
}

#[tokio::test(start_paused = true)]
async fn failing_prompt_is_absorbed() {
    // NumberedWords makes the second prompt of the first batch "Story: w1 w1 w1 w1 w1"
    let client = ScriptedClient::new(slow(3)).with_script("Story: w1 w1 w1 w1 w1", Script::refused("connection refused"));
    let mut driver = BatchSweepDriver::new(dispatcher(client), NumberedWords::default(), Vec::<BatchReport>::new());

    let reports = driver.sweep(&plan(&[2, 2])).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!((reports[0].succeeded, reports[0].failed), (1, 1));
    assert_eq!(reports[0].total_completion_tokens, 3);
    assert_eq!(reports[1].failed, 0);
}

#[tokio::test]
async fn invalid_plan_never_starts() {
    let mut driver = BatchSweepDriver::new(dispatcher(ScriptedClient::new(slow(1))), RandomWords::seeded(1), Vec::<BatchReport>::new());
    for sizes in [&[][..], &[2, 0, 4][..]] {
        let err = driver.sweep(&plan(sizes)).await.unwrap_err();
        assert!(matches!(err, LoadgenError::InvalidBatchSizes { .. }));
    }
    assert!(driver.into_sink().is_empty());
}

struct FailingSink {
    emitted: usize,
}

impl ReportSink for FailingSink {
    fn emit(&mut self, _report: &BatchReport) -> Result<()> {
        self.emitted += 1;
        Err(LoadgenError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
    }
}

struct CountingWords(usize);

impl PromptSource for CountingWords {
    fn words(&mut self, count: usize) -> String {
        self.0 += 1;
        vec!["w"; count].join(" ")
    }
}

#[tokio::test(start_paused = true)]
async fn report_failure_aborts_remaining_sizes() {
    let mut driver = BatchSweepDriver::new(dispatcher(ScriptedClient::new(slow(1))), CountingWords(0), FailingSink { emitted: 0 });

    let err = driver.sweep(&plan(&[1, 2, 3])).await.unwrap_err();
    assert!(matches!(err, LoadgenError::Io(_)));
    assert_eq!(driver.phase(), SweepPhase::Idle);
    assert_eq!(driver.into_sink().emitted, 1);
}

#[derive(Default)]
struct PhaseLog {
    phases: Vec<SweepPhase>,
}

impl ReportSink for PhaseLog {
    fn emit(&mut self, _report: &BatchReport) -> Result<()> { Ok(()) }

    fn phase_changed(&mut self, phase: SweepPhase) { self.phases.push(phase); }
}

#[tokio::test(start_paused = true)]
async fn phases_walk_running_then_reporting_per_size() {
    let mut driver = BatchSweepDriver::new(dispatcher(ScriptedClient::new(slow(1))), RandomWords::seeded(3), PhaseLog::default());

    driver.sweep(&plan(&[4, 1])).await.unwrap();
    use SweepPhase::*;
    assert_eq!(driver.into_sink().phases, vec![Running(4), Reporting(4), Running(1), Reporting(1), Idle]);
}

#[test]
fn random_words_are_exact_and_seedable() {
    let mut a = RandomWords::seeded(42);
    let mut b = RandomWords::seeded(42);
    let text = a.words(10);
    assert_eq!(text.split_whitespace().count(), 10);
    assert_eq!(text, b.words(10));
    assert_eq!(a.words(0), "");
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use loadgen_backend::openai::OpenAiClient;
use loadgen_common::config::LoadgenConfig;
use loadgen_common::parse_batch_sizes;
use loadgen_core::{BatchDispatcher, BatchSweepDriver, NoProgress, ProgressSink, RandomWords, SweepPlan};
use opentelemetry_otlp::WithExportConfig;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod progress;
mod report;

use progress::ConsoleProgress;
use report::ReportLog;

#[derive(Parser, Debug)]
#[command(name = "loadgen", version, about = "Run load tests against an OpenAI-compatible streaming API")]
struct Cli {
    /// The model name
    #[arg(long, default_value = "dsr1")]
    model: String,
    /// Maximum number of tokens to generate per prompt
    #[arg(long, alias = "max_tokens", default_value_t = 200)]
    max_tokens: usize,
    /// Number of random words in each prompt
    #[arg(long, alias = "num_input_words", default_value_t = 10)]
    num_input_words: usize,
    /// Comma-separated list of batch sizes, run in the order given
    #[arg(long, default_value = "1,2,4,8,16,32,64")]
    sizes: String,
    /// Overrides the configured endpoint, e.g. http://localhost:8000/v1
    #[arg(long)]
    base_url: Option<String>,
    /// Seed for prompt words, for repeatable runs
    #[arg(long)]
    seed: Option<u64>,
    /// Skip the live view of in-flight prompts
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = LoadgenConfig::load().context("loading configuration")?;
    if let Some(url) = cli.base_url {
        cfg.base_url = url;
    }
    let batch_sizes = parse_batch_sizes(&cli.sizes)?;
    loadgen_obs::init();

    let client = OpenAiClient::new(&cfg.base_url, &cfg.api_key, cfg.request_timeout_secs.map(Duration::from_secs))?;
    let progress: Arc<dyn ProgressSink> = if cli.quiet { Arc::new(NoProgress) } else { Arc::new(ConsoleProgress) };
    let dispatcher = BatchDispatcher::new(Arc::new(client), progress, Duration::from_millis(cfg.poll_interval_ms.max(1)));
    let words = cli.seed.map(RandomWords::seeded).unwrap_or_default();
    let sink = ReportLog::new(cfg.report_format, cfg.log_path.clone());

    let plan = SweepPlan {
        model: cli.model,
        batch_sizes,
        num_input_words: cli.num_input_words,
        max_tokens: cli.max_tokens,
        prompt_prefix: cfg.prompt_prefix.clone(),
    };
    tracing::info!(target: "sweep", endpoint = %cfg.base_url, model = %plan.model, sizes = ?plan.batch_sizes, "starting sweep");

    let mut driver = BatchSweepDriver::new(dispatcher, words, sink);
    let reports = driver.sweep(&plan).await.context("sweep aborted")?;
    tracing::info!(target: "sweep", batches = reports.len(), log = %cfg.log_path.display(), "sweep complete");

    if let Some(path) = &cfg.metrics_path {
        let text = loadgen_obs::render_text().context("encoding metrics")?;
        std::fs::write(path, text).with_context(|| format!("writing metrics to {}", path.display()))?;
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    // stdout belongs to the progress view and reports
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|endpoint| {
            opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
                .install_simple()
                .ok()
        })
        .map(OpenTelemetryLayer::new);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();
}

//! Observability utilities: load-generator counters and host metrics

use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, IntCounter, IntGauge, TextEncoder};
use sysinfo::System;

static PROMPTS: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("loadgen_prompts_total", "Prompts dispatched").unwrap());
static FAILURES: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("loadgen_prompt_failures_total", "Prompts that ended in an error").unwrap());
static CHUNKS: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("loadgen_chunks_total", "Streamed chunks received (one chunk ~ one token)").unwrap());
static IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| prometheus::register_int_gauge!("loadgen_in_flight", "Prompts currently streaming").unwrap());
static BATCH_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    prometheus::register_histogram!(
        "loadgen_batch_seconds",
        "Wall-clock time for a batch to drain",
        prometheus::exponential_buckets(0.5, 2.0, 12).unwrap()
    )
    .unwrap()
});
static HOST: Lazy<Mutex<System>> = Lazy::new(|| Mutex::new(System::new_all()));

pub fn init() {
    let _ = &*PROMPTS;
    let _ = &*FAILURES;
    let _ = &*CHUNKS;
    let _ = &*IN_FLIGHT;
    let _ = &*BATCH_SECONDS;
    let _ = &*HOST;
}

pub fn prompt_started() {
    PROMPTS.inc();
    IN_FLIGHT.inc();
}

pub fn prompt_finished(failed: bool) {
    IN_FLIGHT.dec();
    if failed { FAILURES.inc(); }
}

pub fn chunk_received() { CHUNKS.inc(); }

pub fn batch_drained(seconds: f64) { BATCH_SECONDS.observe(seconds); }

pub fn in_flight() -> i64 { IN_FLIGHT.get() }

/// Encodes every registered metric in the prometheus text format.
pub fn render_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[derive(Debug, Clone, Copy)]
pub struct HostSnapshot {
    pub cpu_percent: f32,
    pub used_mib: u64,
    pub total_mib: u64,
}

/// CPU and memory of the machine generating load. CPU usage covers the time since the previous call (or since `init`).
pub fn host_snapshot() -> HostSnapshot {
    let mut sys = HOST.lock().unwrap_or_else(PoisonError::into_inner);
    sys.refresh_cpu();
    sys.refresh_memory();
    let cpus = sys.cpus();
    let cpu_percent = if cpus.is_empty() {
        0.0
    } else {
        cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
    };
    HostSnapshot {
        cpu_percent,
        used_mib: sys.used_memory() / 1024 / 1024,
        total_mib: sys.total_memory() / 1024 / 1024,
    }
}

pub fn log_host_snapshot() {
    let host = host_snapshot();
    tracing::info!(
        target: "obs",
        cpu_percent = host.cpu_percent,
        used_mib = host.used_mib,
        total_mib = host.total_mib,
        "load generator host"
    );
}

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use loadgen_common::config::ReportFormat;
use loadgen_common::{LoadgenError, Result};
use loadgen_core::{BatchReport, ReportSink, SweepPhase};

/// Prints each batch report and appends it to the run log.
pub struct ReportLog {
    format: ReportFormat,
    path: PathBuf,
}

impl ReportLog {
    pub fn new(format: ReportFormat, path: PathBuf) -> Self {
        Self { format, path }
    }

    fn render(&self, report: &BatchReport) -> Result<String> {
        match self.format {
            ReportFormat::Text => Ok(report.to_string()),
            ReportFormat::Json => serde_json::to_string(report).map_err(|e| LoadgenError::Message(e.to_string())),
        }
    }

    fn append(&self, block: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{block}")?;
        Ok(())
    }
}

impl ReportSink for ReportLog {
    fn emit(&mut self, report: &BatchReport) -> Result<()> {
        let block = self.render(report)?;
        println!("{block}");
        self.append(&block)?;
        loadgen_obs::log_host_snapshot();
        Ok(())
    }

    fn phase_changed(&mut self, phase: SweepPhase) {
        if let SweepPhase::Running(batch_size) = phase {
            println!("Batch Size: {batch_size}");
        }
    }
}

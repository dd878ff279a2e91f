pub type Result<T> = core::result::Result<T, LoadgenError>;

#[derive(thiserror::Error, Debug)]
pub enum LoadgenError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("malformed chunk: {0}")]
    MalformedChunk(String),
    #[error("server reported error mid-stream: {0}")]
    StreamError(String),
    #[error("invalid batch sizes {input:?}: {reason}")]
    InvalidBatchSizes { input: String, reason: String },
    #[error("cannot compute per-prompt rates for an empty batch")]
    EmptyBatch,
    #[error("elapsed duration must be positive")]
    ZeroDuration,
    #[error("prompt index {0} is already in flight")]
    DuplicateIndex(usize),
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl LoadgenError {
    /// Errors a single prompt may hit without affecting the rest of its batch.
    pub fn is_per_prompt(&self) -> bool {
        matches!(self, Self::Request(_) | Self::MalformedChunk(_) | Self::StreamError(_))
    }
}

/// Parses a comma separated list such as `"1, 2,4"`. Order is preserved.
pub fn parse_batch_sizes(input: &str) -> Result<Vec<usize>> {
    let invalid = |reason: String| LoadgenError::InvalidBatchSizes { input: input.to_string(), reason };
    let mut sizes = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid("empty entry".into()));
        }
        let size: usize = part.parse().map_err(|_| invalid(format!("{part:?} is not a positive integer")))?;
        if size == 0 {
            return Err(invalid("batch size must be at least 1".into()));
        }
        sizes.push(size);
    }
    Ok(sizes)
}

pub mod config {
    use serde::Deserialize;
    use std::env;
    use std::path::PathBuf;
    use std::str::FromStr;

    use crate::{LoadgenError, Result};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum ReportFormat {
        #[default]
        Text,
        Json,
    }

    impl FromStr for ReportFormat {
        type Err = LoadgenError;

        fn from_str(s: &str) -> Result<Self> {
            match s.to_ascii_lowercase().as_str() {
                "text" => Ok(Self::Text),
                "json" => Ok(Self::Json),
                other => Err(LoadgenError::Config(format!("unknown report format {other:?}"))),
            }
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct LoadgenConfig {
        pub base_url: String,
        pub api_key: String,
        pub log_path: PathBuf,
        pub poll_interval_ms: u64,
        pub request_timeout_secs: Option<u64>,
        pub prompt_prefix: String,
        pub report_format: ReportFormat,
        pub metrics_path: Option<PathBuf>,
    }

    impl Default for LoadgenConfig {
        fn default() -> Self {
            Self {
                base_url: "http://localhost:8000/v1".into(),
                // local servers ignore the key but the header must be present
                api_key: "asdf1234".into(),
                log_path: PathBuf::from("load.log"),
                poll_interval_ms: 1000,
                request_timeout_secs: None,
                prompt_prefix: "Tell a story inspired by these words: ".into(),
                report_format: ReportFormat::Text,
                metrics_path: None,
            }
        }
    }

    impl LoadgenConfig {
        /// Reads `LOADGEN_CONFIG` as YAML if set, otherwise applies `LOADGEN_*`
        /// overrides on top of the defaults.
        pub fn load() -> Result<Self> {
            if let Ok(path) = env::var("LOADGEN_CONFIG") {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| LoadgenError::Config(format!("reading {path}: {e}")))?;
                return Self::from_yaml(&text);
            }
            Self::from_env(|key| env::var(key).ok())
        }

        pub fn from_yaml(text: &str) -> Result<Self> {
            serde_yaml::from_str(text).map_err(|e| LoadgenError::Config(e.to_string()))
        }

        pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
            let mut cfg = Self::default();
            if let Some(v) = lookup("LOADGEN_BASE_URL") { cfg.base_url = v; }
            if let Some(v) = lookup("LOADGEN_API_KEY") { cfg.api_key = v; }
            if let Some(v) = lookup("LOADGEN_LOG_PATH") { cfg.log_path = PathBuf::from(v); }
            if let Some(v) = lookup("LOADGEN_POLL_MS") { cfg.poll_interval_ms = parse_var("LOADGEN_POLL_MS", &v)?; }
            if let Some(v) = lookup("LOADGEN_TIMEOUT_SECS") { cfg.request_timeout_secs = Some(parse_var("LOADGEN_TIMEOUT_SECS", &v)?); }
            if let Some(v) = lookup("LOADGEN_PROMPT_PREFIX") { cfg.prompt_prefix = v; }
            if let Some(v) = lookup("LOADGEN_REPORT_FORMAT") { cfg.report_format = v.parse()?; }
            if let Some(v) = lookup("LOADGEN_METRICS_PATH") { cfg.metrics_path = Some(PathBuf::from(v)); }
            Ok(cfg)
        }
    }

    fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| LoadgenError::Config(format!("{key}={value:?} is not a valid number")))
    }
}

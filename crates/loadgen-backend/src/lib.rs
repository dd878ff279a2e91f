//! Streaming completion clients.
//!
//! A client turns one prompt into a lazy, finite stream of text fragments. The
//! load generator never looks inside the wire protocol; it only counts and
//! concatenates what the stream yields.

use std::future::Future;
use std::pin::Pin;

use loadgen_common::Result;
use tokio_stream::Stream;

pub mod openai;
pub mod sse;

/// Fragments of generated text, ending normally or with an error item.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: usize,
}

pub trait StreamingClient: Send + Sync {
    /// Starts a generation. Failing before the first fragment (connection
    /// refused, bad status) is reported here rather than as a stream item.
    fn open(&self, request: CompletionRequest) -> impl Future<Output = Result<ChunkStream>> + Send;
}

#[cfg(feature = "mock")]
pub mod mock {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use loadgen_common::LoadgenError;
    use tokio_stream::StreamExt as _;

    /// What a scripted prompt does when opened.
    #[derive(Debug, Clone, Default)]
    pub struct Script {
        pub chunks: Vec<String>,
        pub chunk_delay: Duration,
        pub fail_on_open: Option<String>,
        /// Emit this error after all of `chunks` instead of ending cleanly.
        pub fail_after_chunks: Option<String>,
    }

    impl Script {
        pub fn chunks<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self { chunks: chunks.into_iter().map(Into::into).collect(), ..Self::default() }
        }

        pub fn refused(reason: impl Into<String>) -> Self {
            Self { fail_on_open: Some(reason.into()), ..Self::default() }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.chunk_delay = delay;
            self
        }

        pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
            self.fail_after_chunks = Some(reason.into());
            self
        }
    }

    /// Replays canned scripts keyed by prompt text. Prompts without a script
    /// get the fallback.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedClient {
        scripts: HashMap<String, Script>,
        fallback: Script,
    }

    impl ScriptedClient {
        pub fn new(fallback: Script) -> Self { Self { scripts: HashMap::new(), fallback } }

        pub fn with_script(mut self, prompt: impl Into<String>, script: Script) -> Self {
            self.scripts.insert(prompt.into(), script);
            self
        }
    }

    impl StreamingClient for ScriptedClient {
        fn open(&self, request: CompletionRequest) -> impl Future<Output = Result<ChunkStream>> + Send {
            let script = self.scripts.get(&request.prompt).unwrap_or(&self.fallback).clone();
            async move {
                if let Some(reason) = script.fail_on_open {
                    return Err(LoadgenError::Request(reason));
                }
                let delay = script.chunk_delay;
                let chunks = tokio_stream::iter(script.chunks.into_iter().map(Ok));
                let tail = tokio_stream::iter(script.fail_after_chunks.map(|r| Err(LoadgenError::StreamError(r))));
                let stream = chunks.chain(tail).then(move |item| async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    item
                });
                Ok(Box::pin(stream) as ChunkStream)
            }
        }
    }
}

//! Client for OpenAI-compatible `/chat/completions` endpoints (vLLM, SGLang,
//! llama.cpp server and friends) in streaming mode.

use std::future::Future;
use std::time::Duration;

use loadgen_common::{LoadgenError, Result};
use serde::Serialize;
use tokio_stream::{wrappers::ReceiverStream, StreamExt as _};

use crate::sse::{SseDecoder, SseEvent};
use crate::{ChunkStream, CompletionRequest, StreamingClient};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    max_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| LoadgenError::Request(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, api_key: api_key.into() })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl StreamingClient for OpenAiClient {
    fn open(&self, request: CompletionRequest) -> impl Future<Output = Result<ChunkStream>> + Send {
        let http = self.http.clone();
        let url = self.endpoint();
        let api_key = self.api_key.clone();
        async move {
            let body = ChatRequest {
                model: &request.model,
                messages: [ChatMessage { role: "user", content: &request.prompt }],
                stream: true,
                max_tokens: request.max_tokens,
            };
            let resp = http
                .post(&url)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| LoadgenError::Request(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let detail = resp.text().await.unwrap_or_default();
                return Err(LoadgenError::Request(format!("{url} returned {status}: {detail}")));
            }

            let (tx, rx) = tokio::sync::mpsc::channel::<Result<String>>(64);
            tokio::spawn(async move {
                let mut bytes = Box::pin(resp.bytes_stream());
                let mut decoder = SseDecoder::new();
                while let Some(next) = bytes.next().await {
                    let events = match next {
                        Ok(buf) => decoder.push(&buf),
                        Err(e) => vec![Err(LoadgenError::Request(e.to_string()))],
                    };
                    for event in events {
                        if !forward(&tx, event).await {
                            return;
                        }
                    }
                }
                if let Some(event) = decoder.finish() {
                    forward(&tx, event).await;
                }
            });
            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        }
    }
}

/// Sends one decoded event downstream. Returns false once the stream is over,
/// either because the server said so or the consumer went away.
async fn forward(tx: &tokio::sync::mpsc::Sender<Result<String>>, event: Result<SseEvent>) -> bool {
    match event {
        Ok(SseEvent::Done) => false,
        Ok(SseEvent::Chunk(text)) => tx.send(Ok(text)).await.is_ok(),
        Err(e) => {
            tracing::debug!(target: "client", error = %e, "stream terminated with error");
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

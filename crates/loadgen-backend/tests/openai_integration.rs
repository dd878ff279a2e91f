use std::convert::Infallible;

use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::post;
use axum::Router;
use loadgen_backend::openai::OpenAiClient;
use loadgen_backend::{CompletionRequest, StreamingClient};
use loadgen_common::LoadgenError;
use tokio_stream::StreamExt as _;

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
    format!("http://{}:{}/v1", addr.ip(), addr.port())
}

fn request() -> CompletionRequest {
    CompletionRequest { model: "test".into(), prompt: "Tell a story".into(), max_tokens: 8 }
}

async fn drain(client: &OpenAiClient) -> Vec<Result<String, LoadgenError>> {
    let stream = client.open(request()).await.unwrap();
    stream.collect().await
}

#[tokio::test]
async fn streams_chunks_until_done() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            let data = [
                r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
                r#"{"choices":[{"delta":{"content":"Once"}}]}"#,
                r#"{"choices":[{"delta":{"content":" upon"}}]}"#,
                "[DONE]",
                r#"{"choices":[{"delta":{"content":"ignored"}}]}"#,
            ];
            let events = data.map(|d| Ok::<_, Infallible>(Event::default().data(d)));
            Sse::new(tokio_stream::iter(events))
        }),
    );
    let client = OpenAiClient::new(spawn_server(app).await, "key", None).unwrap();
    let chunks: Vec<String> = drain(&client).await.into_iter().map(|c| c.unwrap()).collect();
    assert_eq!(chunks, vec!["", "Once", " upon"]);
}

#[tokio::test]
async fn error_status_fails_at_open() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
    );
    let client = OpenAiClient::new(spawn_server(app).await, "key", None).unwrap();
    let err = client.open(request()).await.err().unwrap();
    assert!(matches!(err, LoadgenError::Request(ref m) if m.contains("503")), "{err:?}");
}

#[tokio::test]
async fn mid_stream_error_event_ends_stream() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            let data = [
                r#"{"choices":[{"delta":{"content":"a"}}]}"#,
                r#"{"error":{"message":"kv cache exhausted"}}"#,
            ];
            Sse::new(tokio_stream::iter(data.map(|d| Ok::<_, Infallible>(Event::default().data(d)))))
        }),
    );
    let client = OpenAiClient::new(spawn_server(app).await, "key", None).unwrap();
    let items = drain(&client).await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "a");
    assert!(matches!(items[1], Err(LoadgenError::StreamError(_))));
}

#[tokio::test]
async fn connection_refused_is_a_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let client = OpenAiClient::new(format!("http://127.0.0.1:{port}/v1"), "key", None).unwrap();
    assert!(matches!(client.open(request()).await, Err(LoadgenError::Request(_))));
}

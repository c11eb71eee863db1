//! Embedding service client against a mock server.

use std::time::Duration;

use httpmock::MockServer;
use sitesmith::embed::{EmbedError, EmbeddingProvider, OpenAiEmbedder, EMBEDDING_DIMENSIONS};
use url::Url;

fn embedder(server: &MockServer, client: reqwest::Client) -> OpenAiEmbedder {
    OpenAiEmbedder::new(
        client,
        Url::parse(&server.base_url()).unwrap().join("/").unwrap(),
        "embed-key".to_string(),
        "text-embedding-3-small".to_string(),
    )
}

#[tokio::test]
async fn embed_posts_model_and_input() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/embeddings")
                .header("authorization", "Bearer embed-key")
                .body_contains("\"model\":\"text-embedding-3-small\"")
                .body_contains("\"input\":\"chunk text\"");
            then.status(200).json_body(serde_json::json!({
                "data": [{ "embedding": vec![0.25f32; EMBEDDING_DIMENSIONS] }]
            }));
        })
        .await;

    let vector = embedder(&server, reqwest::Client::new())
        .embed("chunk text")
        .await
        .unwrap();
    assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_a_rejection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/embeddings");
            then.status(429).body(r#"{"error":"rate limited"}"#);
        })
        .await;

    let err = embedder(&server, reqwest::Client::new())
        .embed("chunk text")
        .await
        .unwrap_err();
    assert!(matches!(err, EmbedError::Rejected { status: 429, ref message } if message.contains("rate limited")));
}

#[tokio::test]
async fn slow_response_surfaces_as_timeout_not_rejection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/embeddings");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(serde_json::json!({ "data": [] }));
        })
        .await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let err = embedder(&server, client).embed("chunk text").await.unwrap_err();
    assert!(matches!(err, EmbedError::Timeout));
}

#[tokio::test]
async fn wrong_dimension_count_is_a_protocol_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/embeddings");
            then.status(200)
                .json_body(serde_json::json!({ "data": [{ "embedding": [0.1, 0.2] }] }));
        })
        .await;

    let err = embedder(&server, reqwest::Client::new())
        .embed("chunk text")
        .await
        .unwrap_err();
    assert!(matches!(err, EmbedError::Protocol(_)));
}

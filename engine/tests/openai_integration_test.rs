//! Integration tests for the OpenAI chat and embedding clients
//!
//! Both clients are pointed at a local mock server.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use insight_engine::config::{EmbeddingConfig, LLMConfig};
use insight_engine::knowledge::{Embedder, OpenAIEmbedder};
use insight_engine::llm::{openai::OpenAIProvider, LLMError, LLMProvider, Message, RetryPolicy};
use insight_engine::secrets::{SecretCache, SecretManager, OPENAI_API_KEY};
use sdk::errors::EngineError;

const TEST_KEY: &str = "sk-test-abcdefghijklmnopqrstuvwxyz";

fn secrets() -> Arc<SecretCache> {
    Arc::new(SecretCache::with_values(
        Arc::new(SecretManager::new("insight-test")),
        [(OPENAI_API_KEY, TEST_KEY)],
    ))
}

fn chat_provider(server: &MockServer) -> OpenAIProvider {
    let config = LLMConfig {
        base_url: server.uri(),
        ..LLMConfig::default()
    };
    OpenAIProvider::new(config, secrets())
        .unwrap()
        .with_retry_policy(RetryPolicy::new(2, Duration::ZERO, Duration::ZERO))
}

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_chat_completion_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", format!("Bearer {}", TEST_KEY).as_str()))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "n": 1,
            "messages": [
                {"role": "system", "content": "You plan research."},
                {"role": "user", "content": "Objective: Cure breast cancer"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("  1. PUBMED: BRCA1  \n")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = chat_provider(&server);
    let reply = provider
        .generate(&[
            Message::system("You plan research."),
            Message::user("Objective: Cure breast cancer"),
        ])
        .await
        .unwrap();

    assert_eq!(reply, "1. PUBMED: BRCA1");
}

#[tokio::test]
async fn test_chat_rejected_key_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = chat_provider(&server);
    let err = provider.generate(&[Message::user("hello")]).await.unwrap_err();

    assert!(matches!(err, LLMError::AuthenticationFailed(_)));
    assert!(matches!(EngineError::from(err), EngineError::Authentication(_)));
}

#[tokio::test]
async fn test_chat_rate_limit_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = chat_provider(&server);
    let reply = provider.generate(&[Message::user("hello")]).await.unwrap();
    assert_eq!(reply, "recovered");
}

#[tokio::test]
async fn test_chat_empty_choices_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let provider = chat_provider(&server);
    let err = provider.generate(&[Message::user("hello")]).await.unwrap_err();
    assert!(matches!(err, LLMError::ParseError(_)));
}

fn embedder(server: &MockServer, dimension: usize) -> OpenAIEmbedder {
    let config = EmbeddingConfig {
        base_url: server.uri(),
        dimension,
        ..EmbeddingConfig::default()
    };
    OpenAIEmbedder::new(config, secrets(), Duration::from_secs(5))
        .unwrap()
        .with_retry_policy(RetryPolicy::none())
}

#[tokio::test]
async fn test_embedding_returns_vector() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({
            "model": "text-embedding-ada-002",
            "input": ["BRCA1 repair pathways"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3, 0.4]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vector = embedder(&server, 4).embed("BRCA1 repair pathways").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3, 0.4]);
}

#[tokio::test]
async fn test_embedding_dimension_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]
        })))
        .mount(&server)
        .await;

    let err = embedder(&server, 1536).embed("HER2").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::DimensionMismatch {
            expected: 1536,
            actual: 3
        }
    ));
}

#[tokio::test]
async fn test_embedding_empty_text_is_sent_as_space() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({"input": [" "]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.0, 1.0]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vector = embedder(&server, 2).embed("").await.unwrap();
    assert_eq!(vector.len(), 2);
}

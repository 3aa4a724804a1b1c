//! Integration tests for the Pinecone index client
//!
//! One mock server plays both the controller and the index host.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use insight_engine::config::KnowledgeConfig;
use insight_engine::knowledge::{PineconeIndex, VectorIndex};
use insight_engine::secrets::{SecretCache, SecretManager, PINECONE_API_KEY};
use sdk::errors::EngineError;
use sdk::types::{KnowledgeMetadata, KnowledgeRecord};

const INDEX: &str = "insight-test";
const API_KEY: &str = "pcsk_test_abcdefghijklmnopqrstuvwxyz";

fn index(server: &MockServer, dimension: usize) -> PineconeIndex {
    let config = KnowledgeConfig {
        index_name: INDEX.to_string(),
        controller_url: Some(server.uri()),
        ..KnowledgeConfig::default()
    };
    let secrets = SecretCache::with_values(
        Arc::new(SecretManager::new("insight-test")),
        [(PINECONE_API_KEY, API_KEY)],
    );
    PineconeIndex::new(&config, dimension, &secrets, Duration::from_secs(5))
        .unwrap()
        .with_ready_poll(Duration::ZERO, 3)
}

fn describe_body(server: &MockServer, dimension: usize, ready: bool) -> serde_json::Value {
    json!({
        "database": {"name": INDEX, "dimension": dimension, "metric": "cosine", "pod_type": "p1"},
        "status": {"ready": ready, "host": server.uri(), "state": if ready { "Ready" } else { "Initializing" }}
    })
}

async fn mount_existing_index(server: &MockServer, dimension: usize) {
    Mock::given(method("GET"))
        .and(path("/databases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([INDEX])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/databases/{}", INDEX)))
        .respond_with(ResponseTemplate::new(200).set_body_json(describe_body(server, dimension, true)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_ensure_index_creates_missing_index_and_waits_for_ready() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/databases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/databases"))
        .and(header("Api-Key", API_KEY))
        .and(body_partial_json(json!({
            "name": INDEX,
            "dimension": 8,
            "metric": "cosine",
            "pod_type": "p1"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    // Not ready on the first describe, ready on the second
    Mock::given(method("GET"))
        .and(path(format!("/databases/{}", INDEX)))
        .respond_with(ResponseTemplate::new(200).set_body_json(describe_body(&server, 8, false)))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/databases/{}", INDEX)))
        .respond_with(ResponseTemplate::new(200).set_body_json(describe_body(&server, 8, true)))
        .mount(&server)
        .await;

    index(&server, 8).ensure_index().await.unwrap();
}

#[tokio::test]
async fn test_ensure_index_is_idempotent() {
    let server = MockServer::start().await;
    mount_existing_index(&server, 8).await;

    Mock::given(method("POST"))
        .and(path("/databases"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let index = index(&server, 8);
    index.ensure_index().await.unwrap();
    index.ensure_index().await.unwrap();
    assert!(index.exists().await.unwrap());
}

#[tokio::test]
async fn test_existing_index_with_other_dimension_is_rejected() {
    let server = MockServer::start().await;
    mount_existing_index(&server, 768).await;

    let err = index(&server, 1536).ensure_index().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::DimensionMismatch {
            expected: 1536,
            actual: 768
        }
    ));
}

#[tokio::test]
async fn test_rejected_api_key_is_an_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/databases"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = index(&server, 8).ensure_index().await.unwrap_err();
    assert!(matches!(err, EngineError::Authentication(_)));
}

#[tokio::test]
async fn test_upsert_sends_task_and_result_metadata() {
    let server = MockServer::start().await;
    mount_existing_index(&server, 4).await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(header("Api-Key", API_KEY))
        .and(body_partial_json(json!({
            "vectors": [{
                "id": "doc_id_1",
                "metadata": {"Task": "PUBMED: BRCA1 olaparib", "Result": "PARP inhibitors help"}
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let index = index(&server, 4);
    index.ensure_index().await.unwrap();
    index
        .upsert(KnowledgeRecord {
            id: "doc_id_1".to_string(),
            vector: vec![0.5, 0.5, 0.5, 0.5],
            metadata: KnowledgeMetadata::new("PUBMED: BRCA1 olaparib", "PARP inhibitors help"),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upsert_with_wrong_dimension_never_reaches_server() {
    let server = MockServer::start().await;
    mount_existing_index(&server, 4).await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = index(&server, 4)
        .upsert(KnowledgeRecord {
            id: "doc_id_1".to_string(),
            vector: vec![1.0, 0.0],
            metadata: KnowledgeMetadata::new("task", "result"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DimensionMismatch { .. }));
}

#[tokio::test]
async fn test_query_returns_matches_with_metadata() {
    let server = MockServer::start().await;
    mount_existing_index(&server, 4).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({"topK": 2, "includeMetadata": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {"id": "doc_id_2", "score": 0.93,
                 "metadata": {"Task": "MYGENE: TP53", "Result": "TP53 is a tumour suppressor"}},
                {"id": "doc_id_7", "score": 0.81},
                {"id": "doc_id_1", "score": 0.42,
                 "metadata": {"Task": "Outline screening", "Result": "Mammography every two years"}}
            ],
            "namespace": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let matches = index(&server, 4).query(&[0.1, 0.2, 0.3, 0.4], 2).await.unwrap();

    let ids: Vec<_> = matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["doc_id_2", "doc_id_1"]);
    assert_eq!(matches[0].metadata.task, "MYGENE: TP53");
    assert_eq!(matches[1].metadata.result, "Mammography every two years");
}

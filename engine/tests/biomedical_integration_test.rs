//! Integration tests for the PubMed and MyGene clients

use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use insight_engine::config::{MyGeneConfig, PubMedConfig};
use insight_engine::tools::{GeneLookup, LiteratureSearch, MyGeneClient, PubMedClient};
use sdk::errors::EngineError;

const EMAIL: &str = "researcher@example.org";

fn pubmed(server: &MockServer, max_results: usize) -> PubMedClient {
    paced_pubmed(server, max_results, 0)
}

fn paced_pubmed(server: &MockServer, max_results: usize, request_interval_ms: u64) -> PubMedClient {
    let config = PubMedConfig {
        base_url: server.uri(),
        max_results,
        request_interval_ms,
        ..PubMedConfig::default()
    };
    PubMedClient::new(&config, EMAIL, Duration::from_secs(5)).unwrap()
}

fn mygene(server: &MockServer) -> MyGeneClient {
    let config = MyGeneConfig {
        base_url: server.uri(),
        max_results: 2,
    };
    MyGeneClient::new(&config, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_pubmed_search_fetches_each_abstract() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("db", "pubmed"))
        .and(query_param("term", "BRCA1 AND olaparib"))
        .and(query_param("retmax", "2"))
        .and(query_param("retmode", "json"))
        .and(query_param("email", EMAIL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "header": {"type": "esearch", "version": "0.3"},
            "esearchresult": {"count": "120", "retmax": "2", "idlist": ["38000001", "38000002"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", "38000001"))
        .and(query_param("rettype", "abstract"))
        .and(query_param("retmode", "text"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "1. Lancet Oncol. 2024.\n\nOlaparib in germline BRCA1 carriers.\n\nAbstract text one.\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", "38000002"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
        .expect(1)
        .mount(&server)
        .await;

    let articles = pubmed(&server, 2)
        .search_articles("BRCA1 AND olaparib")
        .await
        .unwrap();

    // The empty record is skipped
    assert_eq!(articles.len(), 1);
    assert!(articles[0].starts_with("1. Lancet Oncol. 2024."));
    assert!(articles[0].ends_with("Abstract text one."));
}

#[tokio::test]
async fn test_pubmed_requests_are_spaced_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "esearchresult": {"idlist": ["1", "2", "3"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Abstract."))
        .expect(3)
        .mount(&server)
        .await;

    let started = Instant::now();
    let articles = paced_pubmed(&server, 3, 100)
        .search_articles("ER-positive")
        .await
        .unwrap();

    assert_eq!(articles.len(), 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
    // Four requests leave three full gaps
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_pubmed_no_hits_returns_no_articles() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "esearchresult": {"count": "0", "idlist": []}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let articles = pubmed(&server, 5).search_articles("zzzz").await.unwrap();
    assert!(articles.is_empty());
}

#[tokio::test]
async fn test_pubmed_rate_limit_is_recoverable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = pubmed(&server, 5).search_articles("HER2").await.unwrap_err();
    assert!(matches!(err, EngineError::RateLimited));
}

#[tokio::test]
async fn test_pubmed_server_error_is_a_literature_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&server)
        .await;

    let err = pubmed(&server, 5).search_articles("HER2").await.unwrap_err();
    assert!(matches!(err, EngineError::Literature(_)));
}

#[tokio::test]
async fn test_mygene_lookup_formats_hits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("q", "BRCA1"))
        .and(query_param("size", "2"))
        .and(query_param("fields", "symbol,name,summary,entrezgene,taxid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 3,
            "total": 57,
            "max_score": 120.5,
            "hits": [
                {"_id": "672", "_score": 120.5, "symbol": "BRCA1",
                 "name": "BRCA1 DNA repair associated", "taxid": 9606,
                 "summary": "Nuclear phosphoprotein that maintains genomic stability."},
                {"_id": "12189", "_score": 80.1, "symbol": "Brca1",
                 "name": "breast cancer 1, early onset", "taxid": 10090}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let digest = mygene(&server).lookup("BRCA1").await.unwrap();

    let lines: Vec<_> = digest.lines().collect();
    assert_eq!(lines[0], "MyGene returned 57 genes for 'BRCA1' (showing 2):");
    assert_eq!(
        lines[1],
        "- BRCA1 (BRCA1 DNA repair associated), gene id 672, taxid 9606: Nuclear phosphoprotein that maintains genomic stability."
    );
    assert_eq!(
        lines[2],
        "- Brca1 (breast cancer 1, early onset), gene id 12189, taxid 10090"
    );
}

#[tokio::test]
async fn test_mygene_no_hits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "hits": []})))
        .mount(&server)
        .await;

    let digest = mygene(&server).lookup("NOTAGENE").await.unwrap();
    assert_eq!(digest, "No MyGene results found for query: NOTAGENE");
}

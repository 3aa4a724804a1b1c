use super::{status_error, transport_error, GeneLookup};
use crate::config::MyGeneConfig;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::info;

const FIELDS: &str = "symbol,name,summary,entrezgene,taxid";

/// Client for the mygene.info gene query service
pub struct MyGeneClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    hits: Vec<GeneHit>,
}

#[derive(Debug, Deserialize)]
struct GeneHit {
    #[serde(rename = "_id")]
    id: String,
    symbol: Option<String>,
    name: Option<String>,
    summary: Option<String>,
    taxid: Option<u64>,
}

impl MyGeneClient {
    pub fn new(config: &MyGeneConfig, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    async fn query(&self, term: &str) -> Result<QueryResponse, EngineError> {
        let url = format!("{}/query", self.base_url);
        let size = self.max_results.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("q", term), ("size", size.as_str()), ("fields", FIELDS)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("MyGene", status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Literature(format!("MyGene response: {}", e)))
    }
}

fn format_hits(term: &str, response: &QueryResponse) -> String {
    if response.hits.is_empty() {
        return format!("No MyGene results found for query: {}", term);
    }

    let mut out = format!(
        "MyGene returned {} genes for '{}' (showing {}):\n",
        response.total,
        term,
        response.hits.len()
    );
    for hit in &response.hits {
        let symbol = hit.symbol.as_deref().unwrap_or("?");
        let name = hit.name.as_deref().unwrap_or("unnamed");
        let _ = write!(out, "- {} ({}), gene id {}", symbol, name, hit.id);
        if let Some(taxid) = hit.taxid {
            let _ = write!(out, ", taxid {}", taxid);
        }
        if let Some(summary) = hit.summary.as_deref() {
            let _ = write!(out, ": {}", summary.trim());
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[async_trait]
impl GeneLookup for MyGeneClient {
    async fn lookup(&self, term: &str) -> Result<String, EngineError> {
        let response = self.query(term).await?;
        info!(term, hits = response.hits.len(), total = response.total, "MyGene query");
        Ok(format_hits(term, &response))
    }
}

//! PubMed search through the NCBI Entrez E-utilities
//!
//! `esearch` finds PMIDs for a query; `efetch` pulls each abstract as plain
//! text. NCBI asks every client to identify itself with a tool name and a
//! contact email, both sent on every request. Requests are spaced at least
//! `request_interval` apart to stay under the E-utilities rate limit.

use super::{status_error, transport_error, LiteratureSearch};
use crate::config::PubMedConfig;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct PubMedClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    tool: String,
    email: String,
    request_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedClient {
    pub fn new(config: &PubMedConfig, email: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            tool: config.tool.clone(),
            email: email.into(),
            request_interval: Duration::from_millis(config.request_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Wait until `request_interval` has passed since the previous request.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let wait = (previous + self.request_interval).saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                debug!(wait_ms = wait.as_millis() as u64, "Pacing PubMed request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// PMIDs matching `query`, at most `max_results`
    pub async fn search(&self, query: &str) -> Result<Vec<String>, EngineError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let retmax = self.max_results.to_string();

        self.pace().await;
        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("term", query),
                ("retmax", retmax.as_str()),
                ("retmode", "json"),
                ("tool", self.tool.as_str()),
                ("email", self.email.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("PubMed esearch", status, &body));
        }

        let parsed: ESearchResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Literature(format!("esearch response: {}", e)))?;

        let mut ids = parsed.esearchresult.idlist;
        ids.truncate(self.max_results);
        Ok(ids)
    }

    /// Plain-text abstract record for one PMID
    pub async fn fetch_abstract(&self, pmid: &str) -> Result<String, EngineError> {
        let url = format!("{}/efetch.fcgi", self.base_url);

        self.pace().await;
        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("id", pmid),
                ("rettype", "abstract"),
                ("retmode", "text"),
                ("tool", self.tool.as_str()),
                ("email", self.email.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("PubMed efetch", status, &body));
        }

        response
            .text()
            .await
            .map(|t| t.trim().to_string())
            .map_err(transport_error)
    }
}

#[async_trait]
impl LiteratureSearch for PubMedClient {
    async fn search_articles(&self, query: &str) -> Result<Vec<String>, EngineError> {
        let ids = self.search(query).await?;
        info!(query, hits = ids.len(), "PubMed search");

        let mut articles = Vec::with_capacity(ids.len());
        for id in &ids {
            let text = self.fetch_abstract(id).await?;
            if text.is_empty() {
                warn!(pmid = %id, "Empty abstract record, skipping");
                continue;
            }
            debug!(pmid = %id, chars = text.len(), "Fetched abstract");
            articles.push(text);
        }
        Ok(articles)
    }
}

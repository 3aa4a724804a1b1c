//! Pinecone vector index client
//!
//! Index management goes through the environment's controller
//! (`https://controller.<env>.pinecone.io`); vectors are written to and
//! queried from the per-index host reported by `describe`.

use super::{check_dimension, ScoredMatch, VectorIndex};
use crate::config::KnowledgeConfig;
use crate::secrets::{SecretCache, SecretString, PINECONE_API_KEY, PINECONE_ENV};
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{KnowledgeMetadata, KnowledgeRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: SecretString,
    controller_url: String,
    name: String,
    dimension: usize,
    metric: String,
    pod_type: String,
    host: OnceCell<String>,
    ready_poll_interval: Duration,
    ready_poll_attempts: u32,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    pod_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    database: IndexDatabase,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Deserialize)]
struct IndexDatabase {
    dimension: usize,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Debug, Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a KnowledgeMetadata,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<KnowledgeMetadata>,
}

impl PineconeIndex {
    /// Build a client from config and the resolved Pinecone credentials.
    ///
    /// `PINECONE_ENV` is only needed when `controller_url` is not set.
    pub fn new(
        config: &KnowledgeConfig,
        dimension: usize,
        secrets: &SecretCache,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let api_key = secrets.get_secret(PINECONE_API_KEY)?;
        let controller_url = match &config.controller_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let env = secrets.get_secret(PINECONE_ENV)?;
                format!("https://controller.{}.pinecone.io", env.expose())
            }
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            controller_url,
            name: config.index_name.clone(),
            dimension,
            metric: config.metric.clone(),
            pod_type: config.pod_type.clone(),
            host: OnceCell::new(),
            ready_poll_interval: Duration::from_secs(5),
            ready_poll_attempts: 60,
        })
    }

    /// Override how often and how long `ensure_index` waits for a new index
    pub fn with_ready_poll(mut self, interval: Duration, attempts: u32) -> Self {
        self.ready_poll_interval = interval;
        self.ready_poll_attempts = attempts.max(1);
        self
    }

    async fn list_indexes(&self) -> Result<Vec<String>, EngineError> {
        let url = format!("{}/databases", self.controller_url);
        let response = self.send(self.client.get(&url)).await?;
        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| EngineError::VectorIndex(format!("list indexes: {}", e)))
    }

    /// Whether the controller already lists this index
    pub async fn exists(&self) -> Result<bool, EngineError> {
        Ok(self.list_indexes().await?.iter().any(|name| name == &self.name))
    }

    async fn create_index(&self) -> Result<(), EngineError> {
        let url = format!("{}/databases", self.controller_url);
        let body = CreateIndexRequest {
            name: &self.name,
            dimension: self.dimension,
            metric: &self.metric,
            pod_type: &self.pod_type,
        };
        self.send(self.client.post(&url).json(&body)).await?;
        info!(
            index = %self.name,
            dimension = self.dimension,
            metric = %self.metric,
            pod_type = %self.pod_type,
            "Created Pinecone index"
        );
        Ok(())
    }

    async fn describe(&self) -> Result<DescribeIndexResponse, EngineError> {
        let url = format!("{}/databases/{}", self.controller_url, self.name);
        let response = self.send(self.client.get(&url)).await?;
        response
            .json::<DescribeIndexResponse>()
            .await
            .map_err(|e| EngineError::VectorIndex(format!("describe index: {}", e)))
    }

    /// Describe the index until it reports ready, then verify its dimension.
    async fn wait_until_ready(&self) -> Result<String, EngineError> {
        for attempt in 1..=self.ready_poll_attempts {
            let described = self.describe().await?;

            if described.database.dimension != self.dimension {
                return Err(EngineError::DimensionMismatch {
                    expected: self.dimension,
                    actual: described.database.dimension,
                });
            }

            match described.status.host {
                Some(host) if described.status.ready && !host.is_empty() => {
                    return Ok(normalize_host(&host));
                }
                _ => {
                    debug!(index = %self.name, attempt, "Index not ready yet");
                    tokio::time::sleep(self.ready_poll_interval).await;
                }
            }
        }

        Err(EngineError::VectorIndex(format!(
            "index '{}' did not become ready",
            self.name
        )))
    }

    async fn data_url(&self) -> Result<&str, EngineError> {
        self.host
            .get_or_try_init(|| self.wait_until_ready())
            .await
            .map(String::as_str)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, EngineError> {
        let response = request
            .header("Api-Key", self.api_key.expose())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout
                } else {
                    EngineError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => EngineError::Authentication(format!("Pinecone rejected the API key: {}", status)),
            429 => EngineError::RateLimited,
            _ => EngineError::VectorIndex(format!("{}: {}", status, body)),
        })
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ensure_index(&self) -> Result<(), EngineError> {
        if self.exists().await? {
            debug!(index = %self.name, "Pinecone index already exists");
        } else {
            self.create_index().await?;
        }

        self.data_url().await?;
        Ok(())
    }

    async fn upsert(&self, record: KnowledgeRecord) -> Result<(), EngineError> {
        check_dimension(self.dimension, &record.vector)?;

        let url = format!("{}/vectors/upsert", self.data_url().await?);
        let body = UpsertRequest {
            vectors: vec![UpsertVector {
                id: &record.id,
                values: &record.vector,
                metadata: &record.metadata,
            }],
        };

        self.send(self.client.post(&url).json(&body)).await?;
        debug!(id = %record.id, "Upserted vector");
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, EngineError> {
        check_dimension(self.dimension, vector)?;

        let url = format!("{}/query", self.data_url().await?);
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });

        let response = self.send(self.client.post(&url).json(&body)).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| EngineError::VectorIndex(format!("query response: {}", e)))?;

        let mut matches = Vec::with_capacity(parsed.matches.len());
        for m in parsed.matches {
            match m.metadata {
                Some(metadata) => matches.push(ScoredMatch {
                    id: m.id,
                    score: m.score,
                    metadata,
                }),
                None => warn!(id = %m.id, "Dropping match without Task/Result metadata"),
            }
        }
        Ok(matches)
    }
}

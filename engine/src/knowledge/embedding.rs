//! OpenAI embeddings client
//!
//! Calls the `/embeddings` endpoint of any OpenAI-compatible API and checks
//! that the returned vector has exactly the configured dimension.

use super::{check_dimension, Embedder};
use crate::config::EmbeddingConfig;
use crate::llm::{error_for_status, error_for_transport, LLMError, RetryPolicy};
use crate::secrets::{SecretCache, OPENAI_API_KEY};
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub struct OpenAIEmbedder {
    config: EmbeddingConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(
        config: EmbeddingConfig,
        secret_cache: Arc<SecretCache>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self {
            config,
            secret_cache,
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        let api_key = self
            .secret_cache
            .get_secret(OPENAI_API_KEY)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = EmbeddingsRequest {
            model: &self.config.model,
            input: vec![text],
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.expose()))
            .json(&body)
            .send()
            .await
            .map_err(error_for_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, self.secret_cache.scrub(&text)));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("embedding response: {}", e)))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LLMError::ParseError("Empty embedding response".to_string()))
    }
}

fn embedding_error(err: LLMError) -> EngineError {
    match err {
        LLMError::ProviderUnavailable(msg)
        | LLMError::InvalidRequest(msg)
        | LLMError::ParseError(msg) => EngineError::Embedding(msg),
        other => other.into(),
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        // The endpoint rejects empty input.
        let input = if text.trim().is_empty() { " " } else { text };

        let vector = self
            .retry
            .execute(|| self.request(input))
            .await
            .map_err(embedding_error)?;

        check_dimension(self.config.dimension, &vector)?;

        tracing::debug!(
            model = %self.config.model,
            chars = text.len(),
            "Embedded text"
        );
        Ok(vector)
    }
}

//! OpenAI-compatible HTTP providers for embeddings and completions

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::{CompletionConfig, EmbeddingConfig};
use crate::error::{Error, Result};
use crate::providers::completion::CompletionProvider;
use crate::providers::embedding::EmbeddingProvider;

/// Shared HTTP client for an OpenAI-compatible API
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(Error::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::internal(format!(
                "{} returned {}: {}",
                url, status, text
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(classify_transport_error)
    }

    /// Probe the API by listing models
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(classify_transport_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::internal(format!(
                "health check failed: {}",
                response.status()
            )))
        }
    }
}

/// Connection-level failures are retryable network errors; everything else
/// stays an HTTP error.
fn classify_transport_error(e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() {
        Error::Network(e.to_string())
    } else {
        Error::Http(e)
    }
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding provider backed by the `/embeddings` endpoint
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: Arc<OpenAiClient>, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            dimensions: 1536,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.model,
            "input": text,
        });
        let response = self.client.post_json("/embeddings", body).await?;
        let data: Vec<EmbeddingData> =
            serde_json::from_value(response["data"].clone()).map_err(|e| {
                Error::embedding(format!("unexpected embeddings response shape: {}", e))
            })?;
        data.into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::embedding("empty embeddings response"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<()> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai-embeddings"
    }
}

/// Completion provider backed by the `/chat/completions` endpoint
pub struct OpenAiCompletion {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
}

impl OpenAiCompletion {
    pub fn new(client: Arc<OpenAiClient>, config: &CompletionConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self.client.post_json("/chat/completions", body).await?;
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Completion("empty completion response".to_string()))
    }

    async fn health_check(&self) -> Result<()> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai-chat"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

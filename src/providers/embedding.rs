//! Embedding provider trait and retry policy

use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Trait for embedding generation backends
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding vector dimensionality
    fn dimensions(&self) -> usize;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<()>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Retry behavior for embedding calls.
///
/// Rate limits are retried indefinitely after the server-suggested delay (or
/// a default); transient network failures get a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub rate_limit_delay: Duration,
    pub network_retries: u32,
    pub network_retry_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            rate_limit_delay: Duration::from_secs(config.rate_limit_delay_secs),
            network_retries: config.network_retries,
            network_retry_delay: Duration::from_secs(config.network_retry_delay_secs),
        }
    }

    #[cfg(test)]
    pub fn immediate(network_retries: u32) -> Self {
        Self {
            rate_limit_delay: Duration::ZERO,
            network_retries,
            network_retry_delay: Duration::ZERO,
        }
    }
}

/// Embed a text, absorbing rate limits and transient network failures
/// according to the policy. Any other error is returned as-is.
pub async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    policy: &RetryPolicy,
    text: &str,
) -> Result<Vec<f32>> {
    let mut network_failures: u32 = 0;

    loop {
        match provider.embed(text).await {
            Ok(vector) => return Ok(vector),
            Err(Error::RateLimited { retry_after_secs }) => {
                let delay = retry_after_secs
                    .map(Duration::from_secs)
                    .unwrap_or(policy.rate_limit_delay);
                tracing::warn!(
                    provider = provider.name(),
                    delay_secs = delay.as_secs(),
                    "embedding rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(Error::Network(msg)) => {
                network_failures += 1;
                if network_failures >= policy.network_retries {
                    tracing::error!(
                        provider = provider.name(),
                        attempts = network_failures,
                        "embedding failed after bounded network retries"
                    );
                    return Err(Error::Network(msg));
                }
                tracing::warn!(
                    provider = provider.name(),
                    attempt = network_failures,
                    "transient network error, retrying: {}",
                    msg
                );
                tokio::time::sleep(policy.network_retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

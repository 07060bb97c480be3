//! Completion provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for completion/chat model backends
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run a prompt through the model and return the raw response text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<()>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier in use
    fn model(&self) -> &str;
}

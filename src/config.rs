//! Configuration for the emissions-rag pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
    /// Maximum upload size in bytes
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: true,
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// SQLite storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Scratch directory and staging behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_dir")]
    pub dir: String,
    /// Files above this size get a compression pass before staging completes
    #[serde(default = "default_compress_threshold")]
    pub compress_threshold_bytes: u64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
            compress_threshold_bytes: default_compress_threshold(),
        }
    }
}

/// Chunking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Embedding provider settings and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Fallback backoff when a rate-limit response carries no retry-after
    #[serde(default = "default_retry_delay")]
    pub rate_limit_delay_secs: u64,
    /// Bounded retries for transient network failures
    #[serde(default = "default_network_retries")]
    pub network_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub network_retry_delay_secs: u64,
    /// Per-request timeout for the embeddings API
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            model: default_embedding_model(),
            rate_limit_delay_secs: default_retry_delay(),
            network_retries: default_network_retries(),
            network_retry_delay_secs: default_retry_delay(),
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Completion model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request timeout for the completions API
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            model: default_completion_model(),
            temperature: default_temperature(),
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Extraction backend endpoints and poll policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_layout_url")]
    pub layout_base_url: String,
    #[serde(default = "default_parse_url")]
    pub parse_base_url: String,
    /// Documents with at least this many pages are split before extraction
    #[serde(default = "default_split_page_threshold")]
    pub split_page_threshold: u32,
    #[serde(default = "default_split_parts")]
    pub split_parts: u32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Total wait bound for the poll-based backend
    #[serde(default = "default_poll_max_wait")]
    pub poll_max_wait_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            layout_base_url: default_layout_url(),
            parse_base_url: default_parse_url(),
            split_page_threshold: default_split_page_threshold(),
            split_parts: default_split_parts(),
            poll_interval_secs: default_poll_interval(),
            poll_max_wait_secs: default_poll_max_wait(),
        }
    }
}

/// Vector index behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Records per upsert request
    #[serde(default = "default_upsert_batch")]
    pub upsert_batch_size: usize,
    /// Matches retrieved per structured-extraction category
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            upsert_batch_size: default_upsert_batch(),
            top_k: default_top_k(),
        }
    }
}

/// Queue liveness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// A job without a heartbeat for this long is considered stalled
    #[serde(default = "default_liveness_window")]
    pub liveness_window_secs: u64,
    /// Lease TTL for the single processing slot
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            liveness_window_secs: default_liveness_window(),
            lease_ttl_secs: default_lease_ttl(),
            watchdog_interval_secs: default_watchdog_interval(),
        }
    }
}

/// Worker supervision settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_supervisor_poll")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Base delay for exponential restart backoff
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_supervisor_poll(),
            max_restarts: default_max_restarts(),
            backoff_base_secs: default_backoff_base(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_max_upload_size() -> usize {
    100 * 1024 * 1024
}

fn default_db_path() -> String {
    "emissions_rag.db".to_string()
}

fn default_staging_dir() -> String {
    "staging".to_string()
}

fn default_compress_threshold() -> u64 {
    15 * 1024 * 1024
}

fn default_chunk_size() -> usize {
    1536
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_retry_delay() -> u64 {
    5
}

fn default_network_retries() -> u32 {
    3
}

fn default_completion_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_request_timeout() -> u64 {
    120
}

fn default_layout_url() -> String {
    "http://localhost:9100".to_string()
}

fn default_parse_url() -> String {
    "https://api.cloud.llamaindex.ai/api/parsing".to_string()
}

fn default_split_page_threshold() -> u32 {
    4
}

fn default_split_parts() -> u32 {
    4
}

fn default_poll_interval() -> u64 {
    10
}

fn default_poll_max_wait() -> u64 {
    600
}

fn default_upsert_batch() -> usize {
    20
}

fn default_top_k() -> usize {
    5
}

fn default_liveness_window() -> u64 {
    300
}

fn default_lease_ttl() -> u64 {
    3600
}

fn default_watchdog_interval() -> u64 {
    30
}

fn default_supervisor_poll() -> u64 {
    5
}

fn default_max_restarts() -> u32 {
    5
}

fn default_backoff_base() -> u64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_contract() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.chunk_size, 1536);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.index.upsert_batch_size, 20);
        assert_eq!(config.index.top_k, 5);
        assert_eq!(config.staging.compress_threshold_bytes, 15 * 1024 * 1024);
        assert_eq!(config.embedding.network_retries, 3);
        assert_eq!(config.embedding.rate_limit_delay_secs, 5);
        assert_eq!(config.embedding.network_retry_delay_secs, 5);
        assert_eq!(config.embedding.timeout_secs, 120);
        assert_eq!(config.completion.timeout_secs, 120);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9999

            [chunking]
            chunk_size = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.chunk_overlap, 200);
    }
}

//! Extraction backends
//!
//! Three interchangeable engines turn a staged PDF into plain text plus zero
//! or more CSV table blobs. The variant is chosen at upload time and carried
//! on the processing task.

pub mod layout;
pub mod parse_poll;
pub mod partition;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::types::EngineVariant;

pub use layout::LayoutBackend;
pub use parse_poll::ParsePollBackend;
pub use partition::PartitionBackend;

/// Normalized output of every extraction backend
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    /// Concatenated plain text
    pub text: String,
    /// Table contents as CSV blobs
    pub tables: Vec<String>,
}

/// Trait implemented by each extraction engine
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Extract text and tables from a staged file
    async fn extract(&self, staged_file: &Path) -> Result<ExtractionOutput>;

    fn variant(&self) -> EngineVariant;
}

/// Registry mapping an engine variant to its backend
pub struct ExtractionEngines {
    layout: Arc<dyn ExtractionBackend>,
    parse_poll: Arc<dyn ExtractionBackend>,
    partition: Arc<dyn ExtractionBackend>,
}

impl ExtractionEngines {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            layout: Arc::new(LayoutBackend::new(config)?),
            parse_poll: Arc::new(ParsePollBackend::new(config)?),
            partition: Arc::new(PartitionBackend::new()),
        })
    }

    /// Build a registry from pre-constructed backends (used by tests)
    pub fn with_backends(
        layout: Arc<dyn ExtractionBackend>,
        parse_poll: Arc<dyn ExtractionBackend>,
        partition: Arc<dyn ExtractionBackend>,
    ) -> Self {
        Self {
            layout,
            parse_poll,
            partition,
        }
    }

    pub fn select(&self, variant: EngineVariant) -> Arc<dyn ExtractionBackend> {
        match variant {
            EngineVariant::Layout => self.layout.clone(),
            EngineVariant::ParsePoll => self.parse_poll.clone(),
            EngineVariant::Partition => self.partition.clone(),
        }
    }
}

//! General-partitioning extraction backend
//!
//! Extracts text locally from the staged PDF. Produces no table blobs.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::extraction::{ExtractionBackend, ExtractionOutput};
use crate::types::EngineVariant;

pub struct PartitionBackend;

impl PartitionBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PartitionBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionBackend for PartitionBackend {
    async fn extract(&self, staged_file: &Path) -> Result<ExtractionOutput> {
        let path = staged_file.to_path_buf();
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text(&path)
                .map_err(|e| Error::extraction("partition", format!("PDF extraction failed: {}", e)))
        })
        .await
        .map_err(|e| Error::internal(format!("extraction task failed: {}", e)))??;

        Ok(ExtractionOutput {
            text,
            tables: Vec::new(),
        })
    }

    fn variant(&self) -> EngineVariant {
        EngineVariant::Partition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_a_typed_extraction_error() {
        let backend = PartitionBackend::new();
        let result = backend.extract(Path::new("does-not-exist.pdf")).await;
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }
}

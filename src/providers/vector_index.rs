//! Vector index provider trait and the in-memory implementation

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::{VectorMatch, VectorRecord};

/// Trait for similarity-search index backends
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    /// Upsert a batch of records
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Nearest-neighbor query filtered to one company
    async fn query(
        &self,
        vector: &[f32],
        company_name: &str,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>>;

    /// Remove every record belonging to a company
    async fn delete_company(&self, company_name: &str) -> Result<()>;

    /// Drop the query cache entirely
    async fn flush_cache(&self) -> Result<()>;

    /// Number of records in the index
    async fn len(&self) -> Result<usize>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// In-memory cosine-similarity index with a query cache
pub struct MemoryVectorIndex {
    records: DashMap<String, VectorRecord>,
    query_cache: DashMap<String, Vec<VectorMatch>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            query_cache: DashMap::new(),
        }
    }

    fn cache_key(vector: &[f32], company_name: &str, top_k: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(company_name.as_bytes());
        hasher.update(top_k.to_le_bytes());
        for v in vector {
            hasher.update(v.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl Default for MemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorIndexProvider for MemoryVectorIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        // Any insert can change query results.
        self.query_cache.clear();
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        company_name: &str,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        let key = Self::cache_key(vector, company_name, top_k);
        if let Some(cached) = self.query_cache.get(&key) {
            return Ok(cached.clone());
        }

        let mut matches: Vec<VectorMatch> = self
            .records
            .iter()
            .filter(|entry| entry.metadata.company_name == company_name)
            .map(|entry| VectorMatch {
                id: entry.id.clone(),
                score: cosine_similarity(vector, &entry.values),
                metadata: entry.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        self.query_cache.insert(key, matches.clone());
        Ok(matches)
    }

    async fn delete_company(&self, company_name: &str) -> Result<()> {
        self.records
            .retain(|_, record| record.metadata.company_name != company_name);
        self.query_cache.clear();
        Ok(())
    }

    async fn flush_cache(&self) -> Result<()> {
        self.query_cache.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentKind;

    fn record(company: &str, text: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord::new(company, ContentKind::Text, text.to_string(), values)
    }

    #[tokio::test]
    async fn query_filters_by_company() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                record("Acme", "acme scope 1", vec![1.0, 0.0]),
                record("Other", "other scope 1", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], "Acme", 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metadata.company_name, "Acme");
    }

    #[tokio::test]
    async fn query_ranks_by_similarity_and_truncates() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                record("Acme", "close", vec![1.0, 0.1]),
                record("Acme", "closest", vec![1.0, 0.0]),
                record("Acme", "far", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], "Acme", 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].metadata.text, "closest");
        assert_eq!(matches[1].metadata.text, "close");
    }

    #[tokio::test]
    async fn delete_company_removes_only_that_company() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![
                record("Acme", "a", vec![1.0]),
                record("Other", "b", vec![1.0]),
            ])
            .await
            .unwrap();

        index.delete_company("Acme").await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
        let matches = index.query(&[1.0], "Acme", 5).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn cache_is_invalidated_by_upserts() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(vec![record("Acme", "first", vec![1.0, 0.0])])
            .await
            .unwrap();
        let before = index.query(&[1.0, 0.0], "Acme", 5).await.unwrap();
        assert_eq!(before.len(), 1);

        index
            .upsert(vec![record("Acme", "second", vec![1.0, 0.0])])
            .await
            .unwrap();
        let after = index.query(&[1.0, 0.0], "Acme", 5).await.unwrap();
        assert_eq!(after.len(), 2);
    }
}

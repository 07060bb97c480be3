//! Retrieval-augmented extraction of the emissions schema

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::error::Result;
use crate::fields::categories::{translation_prompt, Category, CATEGORIES};
use crate::fields::parse::parse_category_response;
use crate::providers::{
    embed_with_retry, CompletionProvider, EmbeddingProvider, RetryPolicy, VectorIndexProvider,
};
use crate::storage::Database;

/// Runs the 27 category extractions for one report and persists the merge
pub struct StructuredFieldExtractor {
    db: Arc<Database>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    index: Arc<dyn VectorIndexProvider>,
    retry: RetryPolicy,
    top_k: usize,
}

impl StructuredFieldExtractor {
    pub fn new(
        db: Arc<Database>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        index: Arc<dyn VectorIndexProvider>,
        retry: RetryPolicy,
        top_k: usize,
    ) -> Self {
        Self {
            db,
            embedder,
            completion,
            index,
            retry,
            top_k,
        }
    }

    /// Run every category concurrently, merge the disjoint results, and
    /// upsert them onto the report together with the year.
    pub async fn extract(&self, report_id: i64, year: &str) -> Result<BTreeMap<String, String>> {
        let report = self.db.get_report(report_id)?;
        let language = report
            .language_code
            .clone()
            .unwrap_or_else(|| "en".to_string());

        tracing::info!(
            report_id,
            company = %report.company_name,
            year,
            language = %language,
            "running structured field extraction"
        );

        let tasks = CATEGORIES
            .iter()
            .map(|category| self.run_category(category, &report.company_name, &language, year));
        let results = try_join_all(tasks).await?;

        let mut merged = BTreeMap::new();
        for fields in results {
            merged.extend(fields);
        }

        self.db.upsert_emissions(report_id, year, &merged)?;
        tracing::info!(report_id, fields = merged.len(), "structured extraction persisted");
        Ok(merged)
    }

    async fn run_category(
        &self,
        category: &Category,
        company_name: &str,
        language: &str,
        year: &str,
    ) -> Result<BTreeMap<String, String>> {
        let mut query = category.retrieval_query(year);
        if language != "en" {
            query = self
                .completion
                .complete(&translation_prompt(&query, language))
                .await?;
        }

        let vector = embed_with_retry(self.embedder.as_ref(), &self.retry, &query).await?;
        let matches = self.index.query(&vector, company_name, self.top_k).await?;
        let context: String = matches
            .iter()
            .map(|m| m.metadata.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let raw = self
            .completion
            .complete(&category.prompt(&context, year))
            .await?;
        Ok(parse_category_response(&raw, category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::error::Error;
    use crate::providers::MemoryVectorIndex;
    use crate::types::report::PLACEHOLDER;
    use crate::types::{ContentKind, VectorRecord};

    /// Embedder producing a fixed vector; retrieval ranking is irrelevant here
    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> crate::error::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> crate::error::Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Completion that answers with a scope_1_total figure only when the
    /// retrieved context actually mentions scope 1 data
    struct ScopeOneAware;

    #[async_trait]
    impl CompletionProvider for ScopeOneAware {
        async fn complete(&self, prompt: &str) -> crate::error::Result<String> {
            if prompt.contains("\"scope_1_total\"") && prompt.contains("Scope 1 emissions: 120") {
                Ok(r#"{"scope_1_total": "120"}"#.to_string())
            } else {
                Ok("no structured answer here".to_string())
            }
        }

        async fn health_check(&self) -> crate::error::Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "scope-one-aware"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    async fn fixture() -> (Arc<Database>, Arc<MemoryVectorIndex>, i64) {
        let db = Arc::new(Database::in_memory().unwrap());
        let report_id = db.insert_report("Acme", None).unwrap();

        let index = Arc::new(MemoryVectorIndex::new());
        index
            .upsert(vec![VectorRecord::new(
                "Acme",
                ContentKind::Text,
                "Scope 1 emissions: 120 tCO2e for the year.".to_string(),
                vec![1.0, 0.0],
            )])
            .await
            .unwrap();

        (db, index, report_id)
    }

    fn extractor(
        db: Arc<Database>,
        index: Arc<MemoryVectorIndex>,
        completion: Arc<dyn CompletionProvider>,
    ) -> StructuredFieldExtractor {
        StructuredFieldExtractor::new(
            db,
            Arc::new(FixedEmbedder),
            completion,
            index,
            RetryPolicy::immediate(3),
            5,
        )
    }

    #[tokio::test]
    async fn scope_1_only_data_fills_scope_1_and_placeholders_elsewhere() {
        let (db, index, report_id) = fixture().await;
        let extractor = extractor(db.clone(), index, Arc::new(ScopeOneAware));

        let merged = extractor.extract(report_id, "2023").await.unwrap();
        assert_eq!(merged.get("scope_1_total").map(String::as_str), Some("120"));
        assert_eq!(
            merged.get("scope_3_total").map(String::as_str),
            Some(PLACEHOLDER)
        );
        assert_eq!(
            merged.get("scope_2_total").map(String::as_str),
            Some(PLACEHOLDER)
        );

        let report = db.get_report(report_id).unwrap();
        assert_eq!(report.year_of_emissions.as_deref(), Some("2023"));
        assert_eq!(
            report.emissions.get("scope_1_total").map(String::as_str),
            Some("120")
        );
    }

    #[tokio::test]
    async fn merged_result_covers_every_emission_column() {
        let (db, index, report_id) = fixture().await;
        let extractor = extractor(db, index, Arc::new(ScopeOneAware));
        let merged = extractor.extract(report_id, "2023").await.unwrap();
        assert_eq!(merged.len(), crate::types::EMISSION_COLUMNS.len());
    }

    #[tokio::test]
    async fn rerun_is_idempotent_for_placeholder_keys() {
        let (db, index, report_id) = fixture().await;
        let extractor = extractor(db, index, Arc::new(ScopeOneAware));

        let first = extractor.extract(report_id, "2023").await.unwrap();
        let second = extractor.extract(report_id, "2023").await.unwrap();

        let first_placeholders: Vec<&String> = first
            .iter()
            .filter(|(_, v)| *v == PLACEHOLDER)
            .map(|(k, _)| k)
            .collect();
        let second_placeholders: Vec<&String> = second
            .iter()
            .filter(|(_, v)| *v == PLACEHOLDER)
            .map(|(k, _)| k)
            .collect();
        assert_eq!(first_placeholders, second_placeholders);
    }

    /// Completion provider that always fails
    struct FailingCompletion;

    #[async_trait]
    impl CompletionProvider for FailingCompletion {
        async fn complete(&self, _prompt: &str) -> crate::error::Result<String> {
            Err(Error::Completion("model unavailable".to_string()))
        }

        async fn health_check(&self) -> crate::error::Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn a_failing_category_aborts_the_whole_merge() {
        let (db, index, report_id) = fixture().await;
        let extractor = extractor(db.clone(), index, Arc::new(FailingCompletion));

        assert!(extractor.extract(report_id, "2023").await.is_err());

        // Nothing was persisted.
        let report = db.get_report(report_id).unwrap();
        assert_eq!(report.year_of_emissions, None);
    }
}

//! Vector records staged for index upserts

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Kind of content behind a vector record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Table,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Table => "table",
        }
    }
}

/// Metadata attached to every vector record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub kind: ContentKind,
    pub company_name: String,
    pub text: String,
}

/// One record staged for an index upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// One nearest-neighbor match returned from a query
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: VectorMetadata,
}

// Process-wide sequence keeping record ids collision-free within a run.
static RECORD_SEQ: AtomicU64 = AtomicU64::new(0);

impl VectorRecord {
    /// Build a record with a sequence-based id of the form
    /// `{company}-{seq}-{kind}`
    pub fn new(company_name: &str, kind: ContentKind, text: String, values: Vec<f32>) -> Self {
        let seq = RECORD_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{}-{}-{}", company_name, seq, kind.as_str()),
            values,
            metadata: VectorMetadata {
                kind,
                company_name: company_name.to_string(),
                text,
            },
        }
    }
}

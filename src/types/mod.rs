//! Core types shared across the pipeline

pub mod job;
pub mod report;
pub mod vector;

pub use job::{EngineVariant, JobLog, JobStatus, ProcessingTask};
pub use report::{Report, EMISSION_COLUMNS};
pub use vector::{ContentKind, VectorMatch, VectorMetadata, VectorRecord};

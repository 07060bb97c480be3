//! Job lifecycle types: tasks, status vocabulary, and the log mailbox row

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Extraction engine selected at upload time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineVariant {
    /// Layout-aware split-and-extract backend (text plus table CSVs)
    Layout,
    /// Asynchronous parse backend polled until the remote job finishes
    ParsePoll,
    /// General partitioning (local text extraction)
    Partition,
}

impl EngineVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineVariant::Layout => "layout",
            EngineVariant::ParsePoll => "parse-poll",
            EngineVariant::Partition => "partition",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "layout" => Ok(EngineVariant::Layout),
            "parse-poll" => Ok(EngineVariant::ParsePoll),
            "partition" => Ok(EngineVariant::Partition),
            other => Err(Error::InvalidInput(format!(
                "unknown extraction engine: {}",
                other
            ))),
        }
    }

    /// Stage percentages reported while this variant runs, in order
    pub fn stage_percentages(&self) -> &'static [u8] {
        match self {
            EngineVariant::Layout => &[10, 30, 50, 60, 80, 90, 100],
            EngineVariant::ParsePoll | EngineVariant::Partition => &[10, 30, 50, 80, 100],
        }
    }
}

impl std::fmt::Display for EngineVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status vocabulary persisted to the log row and mirrored onto reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Worker is processing the document
    Ongoing,
    /// Pipeline finished successfully
    Complete,
    /// Worker raised an unrecoverable error
    Error,
    /// Queue detected a stalled worker
    Missing,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Ongoing => "ONGOING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Error => "ERROR",
            JobStatus::Missing => "MISSING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ONGOING" => Some(JobStatus::Ongoing),
            "COMPLETE" => Some(JobStatus::Complete),
            "ERROR" => Some(JobStatus::Error),
            "MISSING" => Some(JobStatus::Missing),
            _ => None,
        }
    }

    /// Terminal states are never overwritten by progress updates
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Error | JobStatus::Missing
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single live log row, acting as a mailbox for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub job_id: Uuid,
    pub document_id: i64,
    pub status: JobStatus,
    pub msg: String,
    /// Percentage string such as "30%"
    pub job_processed: String,
}

impl JobLog {
    pub fn new(job_id: Uuid, document_id: i64) -> Self {
        Self {
            job_id,
            document_id,
            status: JobStatus::Ongoing,
            msg: "Job is still processing.".to_string(),
            job_processed: "0%".to_string(),
        }
    }
}

/// One document's run through the pipeline, as carried by the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub job_id: Uuid,
    pub document_id: i64,
    pub company_name: String,
    /// Filename of the staged PDF inside the scratch directory
    pub filename: String,
    pub engine: EngineVariant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_round_trips_through_parse() {
        for variant in [
            EngineVariant::Layout,
            EngineVariant::ParsePoll,
            EngineVariant::Partition,
        ] {
            assert_eq!(EngineVariant::parse(variant.as_str()).unwrap(), variant);
        }
        assert!(EngineVariant::parse("ocr").is_err());
    }

    #[test]
    fn stage_percentages_are_monotonic() {
        for variant in [
            EngineVariant::Layout,
            EngineVariant::ParsePoll,
            EngineVariant::Partition,
        ] {
            let stages = variant.stage_percentages();
            assert!(stages.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(*stages.last().unwrap(), 100);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Ongoing.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Missing.is_terminal());
    }
}

//! Job status tracking
//!
//! The single authoritative record of the current job lives in the `logs`
//! mailbox; coarse status is mirrored onto the report row so report queries
//! see the lifecycle without joining logs.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::storage::Database;
use crate::types::{JobLog, JobStatus, ProcessingTask};

#[derive(Clone)]
pub struct StatusTracker {
    db: Arc<Database>,
}

impl StatusTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Install the fresh log row for a newly accepted job
    pub fn begin(&self, task: &ProcessingTask) -> Result<()> {
        self.db.replace_log(&JobLog::new(task.job_id, task.document_id))?;
        self.db
            .update_report_status(task.document_id, JobStatus::Ongoing)?;
        Ok(())
    }

    /// Record a pipeline stage percentage
    pub fn progress(&self, job_id: Uuid, document_id: i64, percent: u8) -> Result<()> {
        tracing::info!(%job_id, percent, "job progress");
        // A terminal log row (e.g. watchdog MISSING) wins over late writes;
        // the report mirror moves only when the log row did.
        if self.db.update_log(
            job_id,
            JobStatus::Ongoing,
            "Job is still processing.",
            &format!("{}%", percent),
        )? {
            self.db
                .update_report_status(document_id, JobStatus::Ongoing)?;
        }
        Ok(())
    }

    /// Mark the job complete
    pub fn complete(&self, job_id: Uuid, document_id: i64) -> Result<()> {
        if self.db.update_log(
            job_id,
            JobStatus::Complete,
            "Document uploaded successfully",
            "100%",
        )? {
            self.db
                .update_report_status(document_id, JobStatus::Complete)?;
        }
        Ok(())
    }

    /// Mark the job errored with a human-readable message and error code
    pub fn error(&self, job_id: Uuid, document_id: i64, message: &str, code: &str) -> Result<()> {
        let percent = self
            .db
            .current_log()?
            .map(|log| log.job_processed)
            .unwrap_or_else(|| "0%".to_string());
        if self.db.update_log(
            job_id,
            JobStatus::Error,
            &format!("{} -- {}", message, code),
            &percent,
        )? {
            self.db.update_report_status(document_id, JobStatus::Error)?;
        }
        Ok(())
    }

    /// Mark the job stalled
    pub fn missing(&self, job_id: Uuid, document_id: i64) -> Result<()> {
        let percent = self
            .db
            .current_log()?
            .map(|log| log.job_processed)
            .unwrap_or_else(|| "0%".to_string());
        if self
            .db
            .update_log(job_id, JobStatus::Missing, "Job Stalled", &percent)?
        {
            self.db
                .update_report_status(document_id, JobStatus::Missing)?;
        }
        Ok(())
    }

    /// Current log row for the status endpoint
    pub fn current(&self) -> Result<Option<JobLog>> {
        self.db.current_log()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngineVariant;

    fn task(db: &Database) -> ProcessingTask {
        let document_id = db.insert_report("Acme", None).unwrap();
        ProcessingTask {
            job_id: Uuid::new_v4(),
            document_id,
            company_name: "Acme".to_string(),
            filename: "report.pdf".to_string(),
            engine: EngineVariant::Partition,
        }
    }

    #[test]
    fn lifecycle_is_mirrored_onto_the_report() {
        let db = Arc::new(Database::in_memory().unwrap());
        let tracker = StatusTracker::new(db.clone());
        let task = task(&db);

        tracker.begin(&task).unwrap();
        tracker.progress(task.job_id, task.document_id, 30).unwrap();
        let log = tracker.current().unwrap().unwrap();
        assert_eq!(log.status, JobStatus::Ongoing);
        assert_eq!(log.job_processed, "30%");

        tracker.complete(task.job_id, task.document_id).unwrap();
        let log = tracker.current().unwrap().unwrap();
        assert_eq!(log.status, JobStatus::Complete);
        assert_eq!(log.job_processed, "100%");
        let report = db.get_report(task.document_id).unwrap();
        assert_eq!(report.status.as_deref(), Some("COMPLETE"));
    }

    #[test]
    fn error_message_carries_the_code_and_keeps_the_percentage() {
        let db = Arc::new(Database::in_memory().unwrap());
        let tracker = StatusTracker::new(db.clone());
        let task = task(&db);

        tracker.begin(&task).unwrap();
        tracker.progress(task.job_id, task.document_id, 50).unwrap();
        tracker
            .error(task.job_id, task.document_id, "extraction failed", "EXTRACTION")
            .unwrap();

        let log = tracker.current().unwrap().unwrap();
        assert_eq!(log.status, JobStatus::Error);
        assert_eq!(log.msg, "extraction failed -- EXTRACTION");
        assert_eq!(log.job_processed, "50%");
    }

    #[test]
    fn stall_marks_both_records_missing() {
        let db = Arc::new(Database::in_memory().unwrap());
        let tracker = StatusTracker::new(db.clone());
        let task = task(&db);

        tracker.begin(&task).unwrap();
        tracker.missing(task.job_id, task.document_id).unwrap();

        let log = tracker.current().unwrap().unwrap();
        assert_eq!(log.status, JobStatus::Missing);
        assert_eq!(log.msg, "Job Stalled");
        let report = db.get_report(task.document_id).unwrap();
        assert_eq!(report.status.as_deref(), Some("MISSING"));
    }

    #[test]
    fn late_worker_transitions_cannot_revive_a_stalled_job() {
        let db = Arc::new(Database::in_memory().unwrap());
        let tracker = StatusTracker::new(db.clone());
        let task = task(&db);

        tracker.begin(&task).unwrap();
        tracker.progress(task.job_id, task.document_id, 30).unwrap();
        tracker.missing(task.job_id, task.document_id).unwrap();

        // The worker was only slow, not dead; it reports in afterwards.
        tracker.progress(task.job_id, task.document_id, 50).unwrap();
        tracker.complete(task.job_id, task.document_id).unwrap();

        let log = tracker.current().unwrap().unwrap();
        assert_eq!(log.status, JobStatus::Missing);
        assert_eq!(log.msg, "Job Stalled");
        assert_eq!(log.job_processed, "30%");
        let report = db.get_report(task.document_id).unwrap();
        assert_eq!(report.status.as_deref(), Some("MISSING"));
    }
}

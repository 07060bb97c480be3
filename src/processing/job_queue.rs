//! Durable single-worker job queue
//!
//! One processing slot exists system-wide, held as a TTL lease in the
//! database and acquired atomically at enqueue time. A watchdog marks jobs
//! whose worker stopped heartbeating as stalled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::processing::status::StatusTracker;
use crate::storage::Database;
use crate::types::ProcessingTask;

struct InFlight {
    document_id: i64,
    last_heartbeat: Instant,
}

pub struct JobQueue {
    db: Arc<Database>,
    tracker: StatusTracker,
    sender: mpsc::Sender<ProcessingTask>,
    in_flight: DashMap<Uuid, InFlight>,
    pending: AtomicUsize,
    lease_ttl: Duration,
    liveness_window: Duration,
    watchdog_interval: Duration,
}

impl JobQueue {
    /// Create the queue and the receiver the worker consumes
    pub fn new(
        db: Arc<Database>,
        config: &QueueConfig,
    ) -> (Arc<Self>, mpsc::Receiver<ProcessingTask>) {
        let (sender, receiver) = mpsc::channel(16);
        let queue = Arc::new(Self {
            tracker: StatusTracker::new(db.clone()),
            db,
            sender,
            in_flight: DashMap::new(),
            pending: AtomicUsize::new(0),
            lease_ttl: Duration::from_secs(config.lease_ttl_secs),
            liveness_window: Duration::from_secs(config.liveness_window_secs),
            watchdog_interval: Duration::from_secs(config.watchdog_interval_secs),
        });
        (queue, receiver)
    }

    /// Acquire the single processing slot for a new job
    pub fn try_acquire(&self, job_id: Uuid) -> Result<()> {
        if self.db.try_acquire_lease(job_id, self.lease_ttl)? {
            Ok(())
        } else {
            let holder = self.db.lease_holder()?;
            tracing::debug!(%job_id, ?holder, "processing slot is held");
            Err(Error::JobInFlight)
        }
    }

    /// Install the log row and hand the task to the worker. The caller must
    /// hold the lease for this job.
    pub async fn submit(&self, task: ProcessingTask) -> Result<()> {
        self.tracker.begin(&task)?;
        self.in_flight.insert(
            task.job_id,
            InFlight {
                document_id: task.document_id,
                last_heartbeat: Instant::now(),
            },
        );
        self.pending.fetch_add(1, Ordering::SeqCst);

        let job_id = task.job_id;
        if let Err(e) = self.sender.send(task).await {
            self.in_flight.remove(&job_id);
            self.pending.fetch_sub(1, Ordering::SeqCst);
            self.db.release_lease(job_id)?;
            return Err(Error::internal(format!("queue closed: {}", e)));
        }
        tracing::info!(%job_id, "job enqueued");
        Ok(())
    }

    /// Record worker liveness for a job
    pub fn heartbeat(&self, job_id: Uuid) {
        if let Some(mut entry) = self.in_flight.get_mut(&job_id) {
            entry.last_heartbeat = Instant::now();
        }
    }

    /// Release the slot after a terminal transition
    pub fn finish(&self, job_id: Uuid) -> Result<()> {
        if self.in_flight.remove(&job_id).is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        self.db.release_lease(job_id)
    }

    /// True when no tasks are queued or running
    pub fn is_drained(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }

    pub fn status(&self) -> &StatusTracker {
        &self.tracker
    }

    /// One watchdog sweep: jobs without a recent heartbeat become MISSING
    pub fn check_stalled(&self) -> Result<Vec<Uuid>> {
        let mut stalled = Vec::new();
        for entry in self.in_flight.iter() {
            if entry.last_heartbeat.elapsed() >= self.liveness_window {
                stalled.push((*entry.key(), entry.document_id));
            }
        }

        let mut marked = Vec::new();
        for (job_id, document_id) in stalled {
            tracing::warn!(%job_id, "job stalled, marking MISSING");
            self.tracker.missing(job_id, document_id)?;
            self.finish(job_id)?;
            marked.push(job_id);
        }
        Ok(marked)
    }

    /// Run the stall watchdog until the queue is dropped
    pub fn spawn_watchdog(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let queue = Arc::downgrade(self);
        let interval = self.watchdog_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(queue) = queue.upgrade() else {
                    break;
                };
                if let Err(e) = queue.check_stalled() {
                    tracing::error!("stall watchdog sweep failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngineVariant, JobStatus};

    fn queue_with(liveness_secs: u64) -> (Arc<JobQueue>, mpsc::Receiver<ProcessingTask>, Arc<Database>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let config = QueueConfig {
            liveness_window_secs: liveness_secs,
            lease_ttl_secs: 3600,
            watchdog_interval_secs: 1,
        };
        let (queue, receiver) = JobQueue::new(db.clone(), &config);
        (queue, receiver, db)
    }

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

    #[tokio::test]
    async fn second_job_is_rejected_while_first_holds_the_slot() {
        let (queue, _receiver, db) = queue_with(300);
        let first = task(&db);
        let second = task(&db);

        queue.try_acquire(first.job_id).unwrap();
        queue.submit(first.clone()).await.unwrap();

        assert!(matches!(
            queue.try_acquire(second.job_id),
            Err(Error::JobInFlight)
        ));

        // The first job's log row is untouched by the rejection.
        let log = queue.status().current().unwrap().unwrap();
        assert_eq!(log.job_id, first.job_id);
        assert_eq!(log.status, JobStatus::Ongoing);
    }

    #[tokio::test]
    async fn slot_frees_after_finish() {
        let (queue, _receiver, db) = queue_with(300);
        let first = task(&db);
        let second = task(&db);

        queue.try_acquire(first.job_id).unwrap();
        queue.submit(first.clone()).await.unwrap();
        queue.finish(first.job_id).unwrap();

        assert!(queue.is_drained());
        queue.try_acquire(second.job_id).unwrap();
        queue.submit(second).await.unwrap();
    }

    #[tokio::test]
    async fn stalled_job_becomes_missing_and_releases_the_slot() {
        let (queue, _receiver, db) = queue_with(0);
        let job = task(&db);

        queue.try_acquire(job.job_id).unwrap();
        queue.submit(job.clone()).await.unwrap();

        let marked = queue.check_stalled().unwrap();
        assert_eq!(marked, vec![job.job_id]);

        let log = queue.status().current().unwrap().unwrap();
        assert_eq!(log.status, JobStatus::Missing);
        assert_eq!(log.msg, "Job Stalled");

        // Slot is free again.
        queue.try_acquire(Uuid::new_v4()).unwrap();
    }

    #[tokio::test]
    async fn heartbeat_keeps_a_job_alive() {
        let (queue, _receiver, db) = queue_with(3600);
        let job = task(&db);

        queue.try_acquire(job.job_id).unwrap();
        queue.submit(job.clone()).await.unwrap();
        queue.heartbeat(job.job_id);

        assert!(queue.check_stalled().unwrap().is_empty());
        let log = queue.status().current().unwrap().unwrap();
        assert_eq!(log.status, JobStatus::Ongoing);
    }
}

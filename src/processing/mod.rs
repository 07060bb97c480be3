//! Job queue, worker pipeline, status tracking, and worker supervision

pub mod job_queue;
pub mod status;
pub mod supervisor;
pub mod worker;

pub use job_queue::JobQueue;
pub use status::StatusTracker;
pub use supervisor::{RestartHandle, Supervisor};
pub use worker::Worker;

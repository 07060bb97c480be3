//! In-process worker supervision
//!
//! The worker signals a recycle through a [`RestartHandle`] after a failure
//! or a fully drained completion; the supervisor polls the handle, tears the
//! worker task down, and re-spawns it against the shared receiver. Crash
//! restarts use exponential backoff and stop at a ceiling; requested
//! recycles are routine and do not count against it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::config::SupervisorConfig;
use crate::processing::worker::Worker;
use crate::types::ProcessingTask;

/// Cross-component restart signal, replacing an external restart flag
#[derive(Clone, Default)]
pub struct RestartHandle(Arc<AtomicBool>);

impl RestartHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Consume the flag, returning whether it was raised
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns the worker task's lifecycle
pub struct Supervisor {
    worker: Arc<Worker>,
    receiver: Arc<Mutex<mpsc::Receiver<ProcessingTask>>>,
    restart: RestartHandle,
    poll_interval: Duration,
    max_restarts: u32,
    backoff_base: Duration,
}

impl Supervisor {
    pub fn new(
        worker: Arc<Worker>,
        receiver: mpsc::Receiver<ProcessingTask>,
        restart: RestartHandle,
        config: &SupervisorConfig,
    ) -> Self {
        Self {
            worker,
            receiver: Arc::new(Mutex::new(receiver)),
            restart,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_restarts: config.max_restarts,
            backoff_base: Duration::from_secs(config.backoff_base_secs),
        }
    }

    fn spawn_worker(&self) -> tokio::task::JoinHandle<()> {
        let worker = self.worker.clone();
        let receiver = self.receiver.clone();
        tokio::spawn(worker.run(receiver))
    }

    /// Supervise until the crash-restart ceiling is exhausted
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut crash_restarts: u32 = 0;
            let mut handle = self.spawn_worker();

            loop {
                tokio::time::sleep(self.poll_interval).await;

                let crashed = handle.is_finished();
                let requested = self.restart.take();
                if !crashed && !requested {
                    continue;
                }

                handle.abort();
                let _ = handle.await;

                if crashed {
                    crash_restarts += 1;
                    if crash_restarts > self.max_restarts {
                        tracing::error!(
                            restarts = crash_restarts - 1,
                            "worker crash ceiling reached, giving up"
                        );
                        break;
                    }
                    let backoff = backoff_delay(self.backoff_base, crash_restarts);
                    tracing::warn!(
                        attempt = crash_restarts,
                        backoff_secs = backoff.as_secs(),
                        "worker exited unexpectedly, restarting after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                } else {
                    tracing::info!("recycling worker on request");
                }

                handle = self.spawn_worker();
            }
        })
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped at five minutes
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    std::cmp::min(base * factor as u32, Duration::from_secs(300))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_handle_is_consumed_once() {
        let handle = RestartHandle::new();
        assert!(!handle.take());

        handle.request();
        handle.request();
        assert!(handle.is_requested());
        assert!(handle.take());
        assert!(!handle.take());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, 30), Duration::from_secs(300));
    }

    #[test]
    fn clones_share_the_flag() {
        let a = RestartHandle::new();
        let b = a.clone();
        b.request();
        assert!(a.take());
    }
}

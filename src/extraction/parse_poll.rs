//! Poll-based extraction backend
//!
//! Uploads the document to an asynchronous parse service, polls the remote
//! job until it leaves the pending state, then fetches the markdown result.
//! The poll loop is bounded by a maximum total wait; exceeding it is a fatal
//! extraction error rather than a silent empty result.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::extraction::{ExtractionBackend, ExtractionOutput};
use crate::types::EngineVariant;

pub struct ParsePollBackend {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

#[derive(Deserialize)]
struct ParseJob {
    id: String,
}

#[derive(Deserialize)]
struct ParseJobStatus {
    status: String,
}

#[derive(Deserialize)]
struct ParseResult {
    markdown: String,
}

impl ParsePollBackend {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            http,
            base_url: config.parse_base_url.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_wait: Duration::from_secs(config.poll_max_wait_secs),
        })
    }

    async fn upload(&self, staged_file: &Path) -> Result<String> {
        let bytes = tokio::fs::read(staged_file).await?;
        let filename = staged_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes)
                .file_name(filename)
                .mime_str("application/pdf")
                .map_err(|e| Error::extraction("parse-poll", e.to_string()))?,
        );

        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::extraction("parse-poll", format!("upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::extraction(
                "parse-poll",
                format!("upload returned {}", response.status()),
            ));
        }

        let job: ParseJob = response
            .json()
            .await
            .map_err(|e| Error::extraction("parse-poll", format!("bad upload response: {}", e)))?;
        Ok(job.id)
    }

    async fn job_status(&self, job_id: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/job/{}", self.base_url, job_id))
            .send()
            .await
            .map_err(|e| Error::extraction("parse-poll", format!("status check failed: {}", e)))?;
        let status: ParseJobStatus = response
            .json()
            .await
            .map_err(|e| Error::extraction("parse-poll", format!("bad status response: {}", e)))?;
        Ok(status.status)
    }

    async fn fetch_markdown(&self, job_id: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/job/{}/result/markdown", self.base_url, job_id))
            .send()
            .await
            .map_err(|e| Error::extraction("parse-poll", format!("result fetch failed: {}", e)))?;
        let result: ParseResult = response
            .json()
            .await
            .map_err(|e| Error::extraction("parse-poll", format!("bad result response: {}", e)))?;
        Ok(result.markdown)
    }
}

/// Poll a remote job until it reports a non-pending status, bounded by
/// `max_wait` of total elapsed time.
pub(crate) async fn poll_until_settled<F, Fut>(
    mut fetch_status: F,
    poll_interval: Duration,
    max_wait: Duration,
) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let started = tokio::time::Instant::now();
    loop {
        let status = fetch_status().await?;
        if status != "PENDING" {
            return Ok(status);
        }
        if started.elapsed() >= max_wait {
            return Err(Error::extraction(
                "parse-poll",
                format!(
                    "remote job still pending after {}s, giving up",
                    max_wait.as_secs()
                ),
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[async_trait]
impl ExtractionBackend for ParsePollBackend {
    async fn extract(&self, staged_file: &Path) -> Result<ExtractionOutput> {
        let job_id = self.upload(staged_file).await?;
        tracing::info!(job_id = %job_id, "parse job submitted, polling");

        let status = poll_until_settled(
            || self.job_status(&job_id),
            self.poll_interval,
            self.max_wait,
        )
        .await?;

        if status != "SUCCESS" {
            return Err(Error::extraction(
                "parse-poll",
                format!("remote job finished with status {}", status),
            ));
        }

        let markdown = self.fetch_markdown(&job_id).await?;
        Ok(ExtractionOutput {
            text: markdown,
            tables: Vec::new(),
        })
    }

    fn variant(&self) -> EngineVariant {
        EngineVariant::ParsePoll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn pending_forever_hits_the_wait_bound() {
        let result = poll_until_settled(
            || async { Ok("PENDING".to_string()) },
            Duration::ZERO,
            Duration::ZERO,
        )
        .await;
        match result {
            Err(Error::Extraction { engine, message }) => {
                assert_eq!(engine, "parse-poll");
                assert!(message.contains("still pending"));
            }
            other => panic!("expected extraction error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn pending_then_success_settles() {
        let calls = AtomicU32::new(0);
        let status = poll_until_settled(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Ok("PENDING".to_string())
                    } else {
                        Ok("SUCCESS".to_string())
                    }
                }
            },
            Duration::ZERO,
            Duration::from_secs(60),
        )
        .await
        .unwrap();
        assert_eq!(status, "SUCCESS");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn status_errors_propagate() {
        let result = poll_until_settled(
            || async { Err(Error::extraction("parse-poll", "connection refused")) },
            Duration::ZERO,
            Duration::from_secs(60),
        )
        .await;
        assert!(result.is_err());
    }
}

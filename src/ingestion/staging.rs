//! Scratch-directory staging for uploaded documents
//!
//! The staging area is exclusively owned by the in-flight job. It is fully
//! reset before a new upload lands and cleared again once processing
//! finishes, so no stale artifacts survive between jobs.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Scratch directory holding the staged PDF and backend artifacts
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
    compress_threshold: u64,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>, compress_threshold: u64) -> Self {
        Self {
            root: root.into(),
            compress_threshold,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a staged file will live at
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Remove everything under the scratch directory and recreate it empty
    pub async fn reset(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Write an uploaded file into a freshly reset scratch directory.
    /// Oversized PDFs get a best-effort stream-compression pass.
    pub async fn stage(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("invalid filename: {}", filename)))?
            .to_string();

        self.reset().await?;
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes).await?;

        if bytes.len() as u64 > self.compress_threshold {
            tracing::info!(
                file = %name,
                size = bytes.len(),
                "staged file exceeds threshold, compressing"
            );
            if let Err(e) = compress_pdf_in_place(path.clone()).await {
                tracing::warn!(file = %name, "compression pass failed: {}", e);
            } else {
                let size = tokio::fs::metadata(&path).await?.len();
                if size > self.compress_threshold {
                    tracing::warn!(file = %name, size, "file still above threshold after compression");
                }
            }
        }

        Ok(path)
    }
}

/// Rewrite a PDF with compressed object streams
async fn compress_pdf_in_place(path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut doc = lopdf::Document::load(&path)
            .map_err(|e| Error::InvalidInput(format!("not a readable PDF: {}", e)))?;
        doc.compress();
        doc.save(&path)
            .map_err(|e| Error::internal(format!("failed to save compressed PDF: {}", e)))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::internal(format!("compression task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_resets_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().join("scratch"), u64::MAX);

        area.reset().await.unwrap();
        tokio::fs::write(area.path_for("stale.txt"), b"old")
            .await
            .unwrap();

        let staged = area.stage("report.pdf", b"%PDF-1.4 test").await.unwrap();
        assert!(staged.exists());
        assert!(!area.path_for("stale.txt").exists());
    }

    #[tokio::test]
    async fn stage_rejects_traversal_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().join("scratch"), u64::MAX);
        assert!(area.stage("..", b"data").await.is_err());
    }

    #[tokio::test]
    async fn reset_tolerates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path().join("never-created"), u64::MAX);
        area.reset().await.unwrap();
        assert!(area.root().exists());
    }
}

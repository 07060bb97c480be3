//! Layout-aware extraction backend
//!
//! Large documents are split into page-range parts before being sent to the
//! layout-extraction service; each part comes back as a zip archive holding
//! a structured-data JSON (text elements) and table CSV files.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::extraction::{ExtractionBackend, ExtractionOutput};
use crate::types::EngineVariant;

pub struct LayoutBackend {
    http: reqwest::Client,
    base_url: String,
    split_page_threshold: u32,
    split_parts: u32,
}

impl LayoutBackend {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self {
            http,
            base_url: config.layout_base_url.clone(),
            split_page_threshold: config.split_page_threshold,
            split_parts: config.split_parts,
        })
    }

    /// Send one part to the extraction service and parse the archive reply
    async fn extract_part(&self, part: &Path) -> Result<ExtractionOutput> {
        let bytes = tokio::fs::read(part).await?;
        let filename = part
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("part.pdf")
            .to_string();

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes)
                .file_name(filename)
                .mime_str("application/pdf")
                .map_err(|e| Error::extraction("layout", e.to_string()))?,
        );

        let response = self
            .http
            .post(format!("{}/extract", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::extraction("layout", format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::extraction(
                "layout",
                format!("service returned {}", response.status()),
            ));
        }

        let archive = response
            .bytes()
            .await
            .map_err(|e| Error::extraction("layout", format!("failed to read archive: {}", e)))?;

        tokio::task::spawn_blocking(move || parse_archive(&archive))
            .await
            .map_err(|e| Error::internal(format!("archive parse task failed: {}", e)))?
    }
}

#[async_trait]
impl ExtractionBackend for LayoutBackend {
    async fn extract(&self, staged_file: &Path) -> Result<ExtractionOutput> {
        let parts = split_document(
            staged_file,
            self.split_page_threshold,
            self.split_parts,
        )
        .await?;

        let mut output = ExtractionOutput::default();
        for part in &parts {
            let part_output = self.extract_part(part).await?;
            output.text.push_str(&part_output.text);
            output.tables.extend(part_output.tables);
        }

        // Part files are siblings of the staged file and get removed with
        // the scratch directory, but drop them eagerly anyway.
        for part in parts.iter().filter(|p| p.as_path() != staged_file) {
            let _ = tokio::fs::remove_file(part).await;
        }

        Ok(output)
    }

    fn variant(&self) -> EngineVariant {
        EngineVariant::Layout
    }
}

/// Page ranges (1-based, inclusive) for splitting a document into parts
fn part_ranges(page_count: u32, threshold: u32, parts: u32) -> Vec<(u32, u32)> {
    if page_count < threshold || parts <= 1 {
        return vec![(1, page_count.max(1))];
    }
    let parts = parts.min(page_count);
    let base = page_count / parts;
    let remainder = page_count % parts;
    let mut ranges = Vec::with_capacity(parts as usize);
    let mut start = 1;
    for i in 0..parts {
        let len = base + if i < remainder { 1 } else { 0 };
        ranges.push((start, start + len - 1));
        start += len;
    }
    ranges
}

/// Split a PDF into page-range part files next to the original.
/// Documents below the page threshold are passed through unsplit.
async fn split_document(staged_file: &Path, threshold: u32, parts: u32) -> Result<Vec<PathBuf>> {
    let source = staged_file.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
        let doc = lopdf::Document::load(&source)
            .map_err(|e| Error::extraction("layout", format!("unreadable PDF: {}", e)))?;
        let page_count = doc.get_pages().len() as u32;

        let ranges = part_ranges(page_count, threshold, parts);
        if ranges.len() == 1 {
            return Ok(vec![source]);
        }

        let parent = source.parent().unwrap_or_else(|| Path::new("."));
        let mut outputs = Vec::with_capacity(ranges.len());
        for (i, (start, end)) in ranges.iter().enumerate() {
            let mut part_doc = doc.clone();
            let drop_pages: Vec<u32> = (1..=page_count)
                .filter(|p| p < start || p > end)
                .collect();
            part_doc.delete_pages(&drop_pages);
            part_doc.prune_objects();

            let part_path = parent.join(format!("part_{}.pdf", i + 1));
            part_doc
                .save(&part_path)
                .map_err(|e| Error::extraction("layout", format!("failed to save part: {}", e)))?;
            outputs.push(part_path);
        }
        Ok(outputs)
    })
    .await
    .map_err(|e| Error::internal(format!("split task failed: {}", e)))?
}

#[derive(Deserialize)]
struct StructuredData {
    #[serde(default)]
    elements: Vec<StructuredElement>,
}

#[derive(Deserialize)]
struct StructuredElement {
    #[serde(rename = "Text")]
    text: Option<String>,
}

/// Pull text elements and table CSVs out of a result archive
fn parse_archive(bytes: &[u8]) -> Result<ExtractionOutput> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| Error::extraction("layout", format!("invalid result archive: {}", e)))?;

    let mut output = ExtractionOutput::default();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::extraction("layout", format!("bad archive entry: {}", e)))?;
        let name = entry.name().to_string();

        if name.ends_with("structuredData.json") {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| Error::extraction("layout", format!("unreadable entry: {}", e)))?;
            let data: StructuredData = serde_json::from_str(&content)
                .map_err(|e| Error::extraction("layout", format!("bad structured data: {}", e)))?;
            for element in data.elements {
                if let Some(text) = element.text {
                    output.text.push_str(&text);
                    output.text.push('\n');
                }
            }
        } else if name.contains("tables/") && name.ends_with(".csv") {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| Error::extraction("layout", format!("unreadable table: {}", e)))?;
            output.tables.push(content);
        }
    }
    Ok(output)
}

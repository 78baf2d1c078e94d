//! Turns database-ready report JSON into fragment drafts.
//!
//! Each page contributes text drafts under three chunking strategies
//! (single paragraphs, overlapping paragraph groups, whole-page windows) and
//! one table draft per non-empty table. Drafts carry no embedding yet.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{Collection, FragmentDraft, ImageAnalysis, TablePayload};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportJson {
    #[serde(default)]
    pub document_metadata: Value,
    #[serde(default)]
    pub pages: Vec<PageJson>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageJson {
    #[serde(default)]
    pub page_number: Option<i32>,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub tables: Vec<Value>,
    #[serde(default)]
    pub images: Vec<ImageJson>,
}

/// An embedded page image, as a `data:` URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageJson {
    #[serde(default)]
    pub base64_data: String,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// An image waiting for a description, with the page text around it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImage {
    pub page_number: i32,
    pub image_id: String,
    pub data_url: String,
    pub context: String,
}

pub const IMAGE_MARKER: &str = "[IMAGE CONTENT]";
/// Characters of page text sent to the describer along with an image.
pub const IMAGE_PROMPT_CONTEXT_CHARS: usize = 300;
/// Characters of page text stored with an image description.
pub const IMAGE_STORED_CONTEXT_CHARS: usize = 200;
const IMAGE_CONTEXT_PARAGRAPHS: usize = 3;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub min_paragraph_chars: usize,
    pub min_group_chars: usize,
    pub group_size: usize,
    pub group_step: usize,
    pub min_page_chars: usize,
    pub max_page_words: usize,
    pub window_words: usize,
    pub window_overlap: usize,
    pub max_table_details: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 20,
            min_group_chars: 50,
            group_size: 3,
            group_step: 2,
            min_page_chars: 100,
            max_page_words: 400,
            window_words: 300,
            window_overlap: 50,
            max_table_details: 10,
        }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_file(&self, path: &Path) -> Result<Vec<FragmentDraft>> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let drafts = self.process_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), drafts = drafts.len(), "processed report");
        Ok(drafts)
    }

    pub fn process_str(&self, raw: &str) -> Result<Vec<FragmentDraft>> {
        let report: ReportJson = serde_json::from_str(raw)?;
        Ok(self.process_report(&report))
    }

    pub fn process_report(&self, report: &ReportJson) -> Vec<FragmentDraft> {
        let mut drafts = Vec::new();
        for (index, page) in report.pages.iter().enumerate() {
            let page_number = page.page_number.unwrap_or(index as i32 + 1);
            let text = self.chunk_page(page_number, &page.paragraphs);
            let tables = self.table_drafts(page_number, &page.tables);
            debug!(page = page_number, text = text.len(), tables = tables.len(), "page chunked");
            drafts.extend(text);
            drafts.extend(tables);
        }
        drafts
    }

    /// Images with data, in page order. Context is the page's first three
    /// paragraphs joined by spaces.
    pub fn pending_images(&self, report: &ReportJson) -> Vec<PendingImage> {
        let mut pending = Vec::new();
        for (index, page) in report.pages.iter().enumerate() {
            let page_number = page.page_number.unwrap_or(index as i32 + 1);
            let context = page.paragraphs.iter().take(IMAGE_CONTEXT_PARAGRAPHS).map(String::as_str).collect::<Vec<_>>().join(" ");
            for (n, image) in page.images.iter().enumerate() {
                if image.base64_data.trim().is_empty() { continue; }
                let image_id = image
                    .image_id
                    .clone()
                    .or_else(|| image.filename.clone())
                    .unwrap_or_else(|| format!("page_{:03}_image_{:03}", page_number, n + 1));
                pending.push(PendingImage { page_number, image_id, data_url: image.base64_data.clone(), context: context.clone() });
            }
        }
        pending
    }

    /// Searchable text draft for a described image.
    ///
    /// Non-empty analysis parts are labelled and joined with `". "`, followed
    /// by the page context; the whole is prefixed with [`IMAGE_MARKER`].
    pub fn image_draft(&self, image: &PendingImage, analysis: &ImageAnalysis) -> FragmentDraft {
        let mut parts = Vec::new();
        for (label, value) in [
            ("Image description", &analysis.description),
            ("Text in image", &analysis.ocr_text),
            ("Key insights", &analysis.key_insights),
            ("Data found", &analysis.data_extracted),
        ] {
            if !value.trim().is_empty() { parts.push(format!("{}: {}", label, value.trim())); }
        }
        let context: String = image.context.chars().take(IMAGE_STORED_CONTEXT_CHARS).collect();
        parts.push(format!("Page {} context: {}", image.page_number, context));
        FragmentDraft {
            collection: Collection::Text,
            page_number: image.page_number,
            text: format!("{} {}", IMAGE_MARKER, parts.join(". ")),
            table: TablePayload::Absent,
        }
    }

    fn chunk_page(&self, page_number: i32, paragraphs: &[String]) -> Vec<FragmentDraft> {
        let cfg = &self.chunking_config;
        let mut texts: Vec<String> = Vec::new();
        if paragraphs.is_empty() { return Vec::new(); }

        for paragraph in paragraphs {
            let trimmed = paragraph.trim();
            if char_len(trimmed) > cfg.min_paragraph_chars { texts.push(trimmed.to_string()); }
        }

        if paragraphs.len() > 1 {
            for start in (0..paragraphs.len()).step_by(cfg.group_step.max(1)) {
                let end = (start + cfg.group_size).min(paragraphs.len());
                let combined = paragraphs[start..end].join(" ");
                if char_len(combined.trim()) > cfg.min_group_chars { texts.push(combined.trim().to_string()); }
            }
        }

        let full_page = paragraphs.join(" ");
        if char_len(full_page.trim()) > cfg.min_page_chars {
            let words: Vec<&str> = full_page.split_whitespace().collect();
            if words.len() > cfg.max_page_words {
                texts.extend(self.split_words_with_overlap(&words));
            } else {
                texts.push(full_page.trim().to_string());
            }
        }

        texts
            .into_iter()
            .map(|text| FragmentDraft { collection: Collection::Text, page_number, text, table: TablePayload::Absent })
            .collect()
    }

    fn split_words_with_overlap(&self, words: &[&str]) -> Vec<String> {
        let cfg = &self.chunking_config;
        let step = cfg.window_words.saturating_sub(cfg.window_overlap).max(1);
        let mut chunks = Vec::new();
        for start in (0..words.len()).step_by(step) {
            let end = (start + cfg.window_words).min(words.len());
            let chunk = words[start..end].join(" ");
            if char_len(chunk.trim()) > cfg.min_page_chars { chunks.push(chunk); }
        }
        chunks
    }

    fn table_drafts(&self, page_number: i32, tables: &[Value]) -> Vec<FragmentDraft> {
        let mut drafts = Vec::new();
        for (index, table) in tables.iter().enumerate() {
            let normalized = json!({
                "headers": table.get("headers").cloned().unwrap_or_else(|| json!([])),
                "rows": table.get("rows").cloned().unwrap_or_else(|| json!([])),
            });
            let payload = match TablePayload::from_value(&normalized) {
                Ok(p) => p,
                Err(e) => { warn!(page = page_number, table = index + 1, error = %e, "skipping table"); continue; }
            };
            if payload.headers().is_empty() && payload.rows().is_empty() { continue; }
            let text = self.render_table_text(page_number, &payload);
            drafts.push(FragmentDraft { collection: Collection::Tables, page_number, text, table: payload });
        }
        drafts
    }

    /// Searchable rendering of a table: a column summary, one line per row,
    /// then a capped list of `header is cell` statements.
    pub fn render_table_text(&self, page_number: i32, table: &TablePayload) -> String {
        let mut text = format!("Table from page {} with columns: {}. ", page_number, table.headers().join(", "));
        let labelled = table.labelled_rows();

        let row_lines: Vec<String> = labelled
            .iter()
            .enumerate()
            .filter(|(_, pairs)| !pairs.is_empty())
            .map(|(i, pairs)| {
                let cells: Vec<String> = pairs.iter().map(|(h, c)| format!("{}: {}", h, c)).collect();
                format!("Row {} - {}", i + 1, cells.join(", "))
            })
            .collect();
        let details: Vec<String> = labelled
            .iter()
            .flatten()
            .take(self.chunking_config.max_table_details)
            .map(|(h, c)| format!("{} is {}", h, c))
            .collect();

        if !row_lines.is_empty() { text.push(' '); text.push_str(&row_lines.join(". ")); }
        if !details.is_empty() { text.push_str(" Additional details: "); text.push_str(&details.join(". ")); }
        text
    }

    /// Sorted `*.json` files under `root`.
    pub fn list_report_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("json") { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}

fn char_len(s: &str) -> usize { s.chars().count() }

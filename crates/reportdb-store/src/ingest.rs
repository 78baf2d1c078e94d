//! Report ingestion: chunk, describe images, register, embed, write.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use reportdb_core::data_processor::{DataProcessor, ReportJson};
use reportdb_core::traits::{Embedder, ImageDescriber};
use reportdb_core::types::{Collection, DocumentId, DocumentMeta, FragmentDraft};

use crate::writer::FragmentWriter;

const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub doc_id: DocumentId,
    pub text_chunks: usize,
    pub tables: usize,
    /// Described page images; these rows are also counted in `text_chunks`.
    pub images: usize,
    /// Drafts dropped because no embedding or image description could be computed.
    pub skipped: usize,
}

/// Ingests one database-ready report JSON file.
///
/// When `meta` is `None` the registry entry is built from the file path and
/// the report's `document_metadata` (`company_name`, `report_year`). Page
/// images are described only when a `describer` is given.
pub async fn ingest_report(
    writer: &FragmentWriter,
    embedder: &dyn Embedder,
    describer: Option<&dyn ImageDescriber>,
    path: &Path,
    meta: Option<DocumentMeta>,
) -> Result<IngestSummary> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let report: ReportJson = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    let meta = meta.unwrap_or_else(|| meta_from_report(path, &report));
    let processor = DataProcessor::new();
    let mut drafts = processor.process_report(&report);
    let (images, undescribed) = match describer {
        Some(describer) => describe_images(&processor, describer, &report).await,
        None => (Vec::new(), 0),
    };
    let image_count = images.len();
    drafts.extend(images);

    let doc_id = writer.insert_document(&meta).await?;
    let (text_chunks, tables, unembedded) = match write_fragments(writer, embedder, doc_id, drafts).await {
        Ok(w) => w,
        Err(e) => {
            error!(doc_id, file = %path.display(), error = %e, "document registered but its fragments were not fully written");
            return Err(e.context(format!("document {} left incomplete", doc_id)));
        }
    };

    let skipped = unembedded + undescribed;
    let summary = IngestSummary { doc_id, text_chunks, tables, images: image_count, skipped };
    info!(doc_id, text = text_chunks, tables, images = image_count, skipped, file = %path.display(), "ingested report");
    Ok(summary)
}

/// Ingests every `*.json` report under `dir`, in path order.
pub async fn ingest_directory(
    writer: &FragmentWriter,
    embedder: &dyn Embedder,
    describer: Option<&dyn ImageDescriber>,
    dir: &Path,
) -> Result<Vec<IngestSummary>> {
    let files = DataProcessor::new().list_report_files(dir);
    let mut summaries = Vec::with_capacity(files.len());
    for file in &files {
        summaries.push(ingest_report(writer, embedder, describer, file, None).await?);
    }
    Ok(summaries)
}

/// Embeds and writes drafts; returns text rows, table rows and drafts skipped.
async fn write_fragments(
    writer: &FragmentWriter,
    embedder: &dyn Embedder,
    doc_id: DocumentId,
    drafts: Vec<FragmentDraft>,
) -> Result<(usize, usize, usize)> {
    let (embedded, skipped) = embed_drafts(embedder, writer.dim(), drafts).await?;
    let (text, tables): (Vec<_>, Vec<_>) = embedded.into_iter().partition(|(d, _)| d.collection == Collection::Text);
    let text = writer.write(doc_id, Collection::Text, &text).await?;
    let tables = writer.write(doc_id, Collection::Tables, &tables).await?;
    Ok((text, tables, skipped))
}

/// Describes each page image in turn; failures are logged and counted.
async fn describe_images(processor: &DataProcessor, describer: &dyn ImageDescriber, report: &ReportJson) -> (Vec<FragmentDraft>, usize) {
    let mut drafts = Vec::new();
    let mut failed = 0usize;
    for image in processor.pending_images(report) {
        match describer.describe(&image.data_url, &image.context).await {
            Ok(analysis) => drafts.push(processor.image_draft(&image, &analysis)),
            Err(e) => {
                warn!(page = image.page_number, image = %image.image_id, error = %e, "image description failed, skipping");
                failed += 1;
            }
        }
    }
    (drafts, failed)
}

fn meta_from_report(path: &Path, report: &ReportJson) -> DocumentMeta {
    let md = &report.document_metadata;
    DocumentMeta {
        file_path: path.to_string_lossy().to_string(),
        company_name: md.get("company_name").and_then(|v| v.as_str()).map(str::to_string),
        report_year: md.get("report_year").and_then(|v| v.as_i64()).and_then(|y| i32::try_from(y).ok()),
    }
}

async fn embed_drafts(embedder: &dyn Embedder, dim: usize, drafts: Vec<FragmentDraft>) -> Result<(Vec<(FragmentDraft, Vec<f32>)>, usize)> {
    let pb = ProgressBar::new(drafts.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} fragments ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );

    let mut embedded = Vec::with_capacity(drafts.len());
    let mut skipped = 0usize;
    for chunk in drafts.chunks(EMBED_BATCH) {
        let texts: Vec<String> = chunk.iter().map(|d| d.text.clone()).collect();
        let vectors = match embedder.embed_batch(&texts).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, size = texts.len(), "batch embedding failed, retrying one by one");
                let mut single = Vec::with_capacity(texts.len());
                for t in &texts { single.push(embedder.embed(t).await.unwrap_or_else(|e| { warn!(error = %e, "embedding failed"); None })); }
                single
            }
        };
        skipped += chunk.len().saturating_sub(vectors.len());
        for (draft, vector) in chunk.iter().zip(vectors) {
            match vector {
                Some(v) if v.len() == dim => embedded.push((draft.clone(), v)),
                Some(v) => { warn!(page = draft.page_number, got = v.len(), expected = dim, "dimension mismatch, skipping"); skipped += 1; }
                None => skipped += 1,
            }
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("embedded");
    Ok((embedded, skipped))
}

//! Eager extraction entry points.
//!
//! These wait for every page of a document (and every document of a corpus)
//! and return the full report. Use [`crate::stream::extract_stream`] to
//! receive page reports as they finish instead.

use crate::config::{ExtractionConfig, PageSelection};
use crate::error::ExtractError;
use crate::output::{CorpusReport, DocumentFailure, DocumentMetadata, DocumentReport, ExtractionStats, PageReport};
use crate::pipeline::export::{DiagramExporter, InkscapeExporter};
use crate::pipeline::page::{process_page, PageContext};
use crate::pipeline::vectorize::{self, PageConverter, PopplerConverter};
use crate::pipeline::input;
use crate::pipeline::workspace::DocumentWorkspace;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract diagrams from a directory of PDFs, or from a single PDF file.
pub async fn extract(input: impl AsRef<Path>, config: &ExtractionConfig) -> Result<CorpusReport, ExtractError> {
    let input = input.as_ref();
    if input.is_dir() {
        return extract_corpus(input, config).await;
    }
    let start = Instant::now();
    let report = extract_document(input, config).await?;
    Ok(CorpusReport {
        documents: vec![report],
        failures: Vec::new(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Extract diagrams from every PDF in `input_dir`, one document at a time.
///
/// # Errors
/// Only when the directory itself cannot be read. A document that fails is
/// recorded in [`CorpusReport::failures`] and the run continues.
pub async fn extract_corpus(
    input_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<CorpusReport, ExtractError> {
    let start = Instant::now();
    let input_dir = input_dir.as_ref();
    let documents = input::list_documents(input_dir).await?;
    info!("Found {} PDFs in {}", documents.len(), input_dir.display());

    let mut report = CorpusReport::default();
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    for pdf in documents {
        let name = input::document_name(&pdf);
        // Case-folded: `a.pdf` and `a.PDF` collide.
        if let Some(first) = claimed.get(&name.to_lowercase()) {
            let e = ExtractError::NameCollision {
                path: pdf.clone(),
                name,
                first: first.clone(),
            };
            warn!("Skipping {}: {}", pdf.display(), e);
            report.failures.push(DocumentFailure {
                source: pdf,
                error: e.to_string(),
            });
            continue;
        }
        claimed.insert(name.to_lowercase(), pdf.clone());

        match extract_document(&pdf, config).await {
            Ok(doc) => report.documents.push(doc),
            Err(e) => {
                warn!("Skipping {}: {}", pdf.display(), e);
                report.failures.push(DocumentFailure {
                    source: pdf,
                    error: e.to_string(),
                });
            }
        }
    }

    report.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Corpus complete: {} documents, {} failed, {} diagrams, {}ms",
        report.documents.len(),
        report.failures.len(),
        report.diagrams_exported(),
        report.total_duration_ms
    );
    Ok(report)
}

/// Extract diagrams from one PDF.
///
/// # Returns
/// `Ok(DocumentReport)` even when some pages or diagrams failed; check
/// `report.stats` or call [`DocumentReport::into_result`].
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - Corrupt or encrypted PDF
/// - Page selection matching no page
/// - Working or output directory cannot be created
pub async fn extract_document(
    pdf: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentReport, ExtractError> {
    let total_start = Instant::now();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let pdf = input::resolve_document(pdf.as_ref())?;
    let name = input::document_name(&pdf);
    info!("Starting extraction: {}", pdf.display());

    // ── Step 2: Resolve collaborators ────────────────────────────────────
    let converter = resolve_converter(config);
    let exporter = resolve_exporter(config);

    // ── Step 3: Count pages and select ───────────────────────────────────
    let total_pages = converter.page_count(&pdf).await?;
    let page_numbers = select_pages(config, total_pages)?;
    debug!("Selected {} of {} pages", page_numbers.len(), total_pages);

    // ── Step 4: Prepare workspace ────────────────────────────────────────
    let workspace = DocumentWorkspace::new(name.clone(), &config.tmp_dir, &config.output_dir);
    workspace.prepare().await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(&name, page_numbers.len());
    }

    // ── Step 5: Process pages ────────────────────────────────────────────
    let ctx = PageContext {
        pdf: pdf.clone(),
        workspace: workspace.clone(),
        converter,
        exporter,
        config: config.clone(),
        total_pages: page_numbers.len(),
    };
    let mut pages = if config.concurrency > 1 {
        process_concurrent(&ctx, &page_numbers).await
    } else {
        process_sequential(&ctx, &page_numbers).await
    };
    pages.sort_by_key(|p| p.page_num);

    // ── Step 6: Join point, clean up ─────────────────────────────────────
    let cleaned_up = finish_workspace(&workspace, config.cleanup).await;

    // ── Step 7: Stats ────────────────────────────────────────────────────
    let stats = ExtractionStats::from_pages(total_pages, &pages, total_start.elapsed().as_millis() as u64);
    info!(
        "Extraction complete: {}: {}/{} pages, {} diagrams ({} failed), {}ms",
        name,
        stats.processed_pages,
        stats.selected_pages,
        stats.diagrams_exported,
        stats.diagrams_failed,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_complete(&name, stats.processed_pages, stats.diagrams_exported);
    }

    Ok(DocumentReport {
        name,
        source: pdf,
        output_dir: workspace.out_dir().to_path_buf(),
        pages,
        stats,
        cleaned_up,
    })
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(input: impl AsRef<Path>, config: &ExtractionConfig) -> Result<CorpusReport, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, config))
}

/// Synchronous wrapper around [`extract_document`].
pub fn extract_document_sync(
    pdf: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentReport, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_document(pdf, config))
}

/// Read PDF metadata without running the pipeline.
///
/// Does not require any external tool.
pub async fn inspect(pdf: impl AsRef<Path>) -> Result<DocumentMetadata, ExtractError> {
    let pdf = input::resolve_document(pdf.as_ref())?;
    vectorize::read_metadata(&pdf).await
}

/// Availability of the configured collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCheck {
    pub converter: String,
    pub converter_available: bool,
    pub exporter: String,
    pub exporter_available: bool,
}

impl ToolCheck {
    pub fn all_available(&self) -> bool {
        self.converter_available && self.exporter_available
    }
}

/// Check the converter and exporter the config would use.
pub async fn check_tools(config: &ExtractionConfig) -> ToolCheck {
    let converter = resolve_converter(config);
    let exporter = resolve_exporter(config);
    let (converter_available, exporter_available) =
        tokio::join!(converter.is_available(), exporter.is_available());
    ToolCheck {
        converter: converter.name().to_string(),
        converter_available,
        exporter: exporter.name().to_string(),
        exporter_available,
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Injected converter if any, else `pdftocairo` at the configured path.
pub(crate) fn resolve_converter(config: &ExtractionConfig) -> Arc<dyn PageConverter> {
    match config.converter {
        Some(ref converter) => Arc::clone(converter),
        None => Arc::new(PopplerConverter::from_config(config)),
    }
}

/// Injected exporter if any, else Inkscape at the configured path.
pub(crate) fn resolve_exporter(config: &ExtractionConfig) -> Arc<dyn DiagramExporter> {
    match config.exporter {
        Some(ref exporter) => Arc::clone(exporter),
        None => Arc::new(InkscapeExporter::from_config(config)),
    }
}

/// Apply the page selection. An empty document is not an error; a selection
/// that matches none of its pages is.
pub(crate) fn select_pages(config: &ExtractionConfig, total_pages: usize) -> Result<Vec<usize>, ExtractError> {
    let page_numbers = config.pages.to_page_numbers(total_pages);
    if page_numbers.is_empty() && total_pages > 0 {
        let page = match &config.pages {
            PageSelection::Single(p) => *p,
            PageSelection::Range(s, _) => *s,
            PageSelection::Set(pages) => pages.first().copied().unwrap_or(0),
            PageSelection::All => 0,
        };
        return Err(ExtractError::PageOutOfRange {
            page,
            total: total_pages,
        });
    }
    Ok(page_numbers)
}

/// Remove the working directory when enabled. Returns whether it is gone.
pub(crate) async fn finish_workspace(workspace: &DocumentWorkspace, cleanup: bool) -> bool {
    if !cleanup {
        debug!("{}: keeping {}", workspace.name(), workspace.tmp_dir().display());
        return false;
    }
    match workspace.cleanup().await {
        Ok(()) => true,
        Err(e) => {
            warn!("{}: cleanup failed: {}", workspace.name(), e);
            false
        }
    }
}

/// Process pages one after another, in page order.
async fn process_sequential(ctx: &PageContext, page_numbers: &[usize]) -> Vec<PageReport> {
    let mut results = Vec::with_capacity(page_numbers.len());
    for &page_num in page_numbers {
        results.push(process_page(ctx, page_num).await);
    }
    results
}

/// Process up to `concurrency` pages at once. Results arrive in completion order.
async fn process_concurrent(ctx: &PageContext, page_numbers: &[usize]) -> Vec<PageReport> {
    stream::iter(page_numbers.iter().map(|&page_num| process_page(ctx, page_num)))
        .buffer_unordered(ctx.config.concurrency)
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_out_of_range_is_fatal() {
        let config = ExtractionConfig::builder()
            .pages(PageSelection::Single(9))
            .build()
            .unwrap();
        let err = select_pages(&config, 3).unwrap_err();
        assert!(matches!(err, ExtractError::PageOutOfRange { page: 9, total: 3 }));
    }

    #[test]
    fn empty_document_selects_nothing() {
        let config = ExtractionConfig::default();
        assert!(select_pages(&config, 0).unwrap().is_empty());
    }

    #[test]
    fn default_collaborators_are_external_tools() {
        let config = ExtractionConfig::default();
        assert_eq!(resolve_converter(&config).name(), "pdftocairo");
        assert_eq!(resolve_exporter(&config).name(), "inkscape");
    }

    #[tokio::test]
    async fn finish_workspace_respects_cleanup_flag() {
        let root = tempfile::tempdir().unwrap();
        let ws = DocumentWorkspace::new("doc", &root.path().join("tmp"), &root.path().join("out"));
        ws.prepare().await.unwrap();

        assert!(!finish_workspace(&ws, false).await);
        assert!(ws.tmp_dir().exists());
        assert!(finish_workspace(&ws, true).await);
        assert!(!ws.tmp_dir().exists());
    }

    #[test]
    fn inspect_rejects_missing_file() {
        let err = tokio_test::block_on(inspect("/nonexistent/doc.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }
}

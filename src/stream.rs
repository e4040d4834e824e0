//! Streaming extraction API: emit page reports as pages complete.
//!
//! Unlike the eager [`crate::extract::extract_document`], which returns only
//! after every page finished, [`extract_stream`] yields each [`PageReport`]
//! as soon as its page is done. With `concurrency > 1` pages may arrive out
//! of order (sort by `page_num` if order matters).
//!
//! The working directory is cleaned up after the last page has been yielded,
//! so a caller that drops the stream early keeps `tmp/<doc>/` on disk.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::{finish_workspace, resolve_converter, resolve_exporter, select_pages};
use crate::output::PageReport;
use crate::pipeline::input;
use crate::pipeline::page::{process_page, PageContext};
use crate::pipeline::workspace::DocumentWorkspace;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page reports.
pub type PageStream = Pin<Box<dyn Stream<Item = PageReport> + Send>>;

/// Extract diagrams from one PDF, streaming page reports as they are ready.
///
/// # Returns
/// - `Ok(PageStream)` — one [`PageReport`] per selected page
/// - `Err(ExtractError)` — fatal error (file not found, not a PDF, etc.)
pub async fn extract_stream(pdf: impl AsRef<Path>, config: &ExtractionConfig) -> Result<PageStream, ExtractError> {
    // ── Resolve input ────────────────────────────────────────────────────
    let pdf = input::resolve_document(pdf.as_ref())?;
    let name = input::document_name(&pdf);
    info!("Starting streaming extraction: {}", pdf.display());

    // ── Count pages ──────────────────────────────────────────────────────
    let converter = resolve_converter(config);
    let exporter = resolve_exporter(config);
    let total_pages = converter.page_count(&pdf).await?;
    let page_numbers = select_pages(config, total_pages)?;

    // ── Prepare workspace ────────────────────────────────────────────────
    let workspace = DocumentWorkspace::new(name.clone(), &config.tmp_dir, &config.output_dir);
    workspace.prepare().await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(&name, page_numbers.len());
    }

    // ── Build the stream ─────────────────────────────────────────────────
    let ctx = Arc::new(PageContext {
        pdf,
        workspace,
        converter,
        exporter,
        config: config.clone(),
        total_pages: page_numbers.len(),
    });
    let pages_ok = Arc::new(AtomicUsize::new(0));
    let diagrams = Arc::new(AtomicUsize::new(0));

    let page_ctx = Arc::clone(&ctx);
    let (ok_counter, diagram_counter) = (Arc::clone(&pages_ok), Arc::clone(&diagrams));
    let pages = stream::iter(page_numbers)
        .map(move |page_num| {
            let ctx = Arc::clone(&page_ctx);
            async move { process_page(&ctx, page_num).await }
        })
        .buffer_unordered(config.concurrency)
        .inspect(move |report| {
            if report.error.is_none() {
                ok_counter.fetch_add(1, Ordering::SeqCst);
            }
            diagram_counter.fetch_add(report.exported(), Ordering::SeqCst);
        });

    // Join point: runs once the page stream is exhausted.
    let finish = stream::once(async move {
        finish_workspace(&ctx.workspace, ctx.config.cleanup).await;
        let (ok, exported) = (pages_ok.load(Ordering::SeqCst), diagrams.load(Ordering::SeqCst));
        info!("Streaming extraction complete: {}: {} pages, {} diagrams", name, ok, exported);
        if let Some(ref cb) = ctx.config.progress_callback {
            cb.on_document_complete(&name, ok, exported);
        }
    })
    .filter_map(|()| async { None::<PageReport> });

    Ok(Box::pin(pages.chain(finish)))
}

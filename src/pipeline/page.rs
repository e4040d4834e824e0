//! One page end to end: vectorise → extract primitives → filter → merge →
//! export each region.
//!
//! Diagrams a previous run left for the page are removed first, so the
//! output directory ends up holding exactly this run's `K` set.
//!
//! [`process_page`] always returns a [`PageReport`]. A page-level failure
//! stops that page only; a diagram-level failure stops that diagram only.

use crate::config::ExtractionConfig;
use crate::error::PageError;
use crate::geometry::BoundingBox;
use crate::output::PageReport;
use crate::pipeline::export::{self, DiagramExporter};
use crate::pipeline::merge::merge_regions;
use crate::pipeline::primitives::{extract_primitives, filter_by_area};
use crate::pipeline::vectorize::PageConverter;
use crate::pipeline::workspace::{self, DocumentWorkspace};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything a page needs, shared by all pages of one document.
#[derive(Clone)]
pub struct PageContext {
    pub pdf: PathBuf,
    pub workspace: DocumentWorkspace,
    pub converter: Arc<dyn PageConverter>,
    pub exporter: Arc<dyn DiagramExporter>,
    pub config: ExtractionConfig,
    /// Number of selected pages, for progress events.
    pub total_pages: usize,
}

/// Process page `page_num` (1-based) and fire its progress events.
pub async fn process_page(ctx: &PageContext, page_num: usize) -> PageReport {
    let cb = ctx.config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_page_start(page_num, ctx.total_pages);
    }

    let report = run_page(ctx, page_num).await;

    if let Some(cb) = cb {
        match &report.error {
            None => {
                for d in report.diagrams.iter() {
                    if let Some(e) = &d.error {
                        cb.on_diagram_error(page_num, d.diagram_num, &e.to_string());
                    }
                }
                cb.on_page_complete(page_num, ctx.total_pages, report.exported());
            }
            Some(e) => cb.on_page_error(page_num, ctx.total_pages, &e.to_string()),
        }
    }
    report
}

async fn run_page(ctx: &PageContext, page_num: usize) -> PageReport {
    let start = Instant::now();
    let config = &ctx.config;
    let artifact = ctx.workspace.page_artifact(page_num);

    // ── Step 0: Drop leftovers of an earlier run ─────────────────────────
    match ctx.workspace.clear_page_outputs(page_num).await {
        Ok(0) => {}
        Ok(n) => debug!("Page {}: removed {} diagrams from an earlier run", page_num, n),
        Err(e) => warn!("Page {}: {}", page_num, e),
    }
    if let Err(e) = workspace::remove_stale(&artifact).await {
        let err = PageError::ConversionFailed {
            page: page_num,
            detail: format!("cannot replace {}: {}", artifact.display(), e),
        };
        warn!("{}", err);
        return PageReport::failed(page_num, artifact, err, elapsed_ms(start));
    }

    // ── Step 1: Vectorise ────────────────────────────────────────────────
    if let Err(e) = ctx.converter.convert_page(&ctx.pdf, page_num, &artifact).await {
        warn!("{}", e);
        return PageReport::failed(page_num, artifact, e, elapsed_ms(start));
    }

    // ── Step 2: Primitives ───────────────────────────────────────────────
    let primitives = match extract_primitives(&artifact, page_num).await {
        Ok(p) => p,
        Err(e) => {
            warn!("{}", e);
            return PageReport::failed(page_num, artifact, e, elapsed_ms(start));
        }
    };
    let primitives_found = primitives.len();
    let kept = filter_by_area(primitives, config.min_area);
    debug!(
        "Page {}: {}/{} primitives ≥ {} area",
        page_num,
        kept.len(),
        primitives_found,
        config.min_area
    );

    // ── Step 3: Merge ────────────────────────────────────────────────────
    let boxes: Vec<BoundingBox> = kept.iter().map(|p| p.bbox).collect();
    let regions = merge_regions(&boxes, config.merge_distance, config.merge_mode);
    if regions.is_empty() {
        info!("Page {}: no diagrams found", page_num);
    }

    // ── Step 4: Export ───────────────────────────────────────────────────
    let mut diagrams = Vec::with_capacity(regions.len());
    for region in &regions {
        let out = ctx.workspace.diagram_artifact(page_num, region.rank);
        let result = export::export_region(
            ctx.exporter.as_ref(),
            &artifact,
            region,
            out,
            page_num,
            config,
        )
        .await;
        if let Some(e) = &result.error {
            warn!("{}", e);
        }
        diagrams.push(result);
    }

    let report = PageReport {
        page_num,
        artifact,
        primitives_found,
        primitives_kept: kept.len(),
        diagrams,
        duration_ms: elapsed_ms(start),
        error: None,
    };
    info!(
        "Page {}: {}/{} diagrams exported in {}ms",
        page_num,
        report.exported(),
        report.diagrams.len(),
        report.duration_ms
    );
    report
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

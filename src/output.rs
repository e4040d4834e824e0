//! Result types produced by an extraction run.
//!
//! Reports mirror the processing hierarchy: a [`CorpusReport`] holds one
//! [`DocumentReport`] per document, which holds one [`PageReport`] per page,
//! which holds one [`DiagramResult`] per merged region. Failures below the
//! document level are recorded in place instead of being propagated.

use crate::error::{ExtractError, PageError};
use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of exporting one diagram region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// 1-indexed rank of the region within its page (merge order).
    pub diagram_num: usize,
    /// `output/<document>/page<N>_diagram<K>.svg`.
    pub path: PathBuf,
    /// Integer export area handed to the crop stage.
    pub crop_box: BoundingBox,
    /// Number of primitives merged into the region.
    pub primitive_count: usize,
    /// Whether the crop stage produced a file (it may exist even on autofit failure).
    pub cropped: bool,
    /// Crop or autofit failure, if any.
    pub error: Option<PageError>,
    pub duration_ms: u64,
}

impl DiagramResult {
    /// True when both the crop and the autofit stage completed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of processing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Intermediate vector artifact for the page.
    pub artifact: PathBuf,
    /// Drawable primitives found in the artifact.
    pub primitives_found: usize,
    /// Primitives surviving the minimum-area filter.
    pub primitives_kept: usize,
    /// One entry per merged region, in rank order.
    pub diagrams: Vec<DiagramResult>,
    pub duration_ms: u64,
    /// Page-level failure (conversion or artifact parsing).
    pub error: Option<PageError>,
}

impl PageReport {
    pub(crate) fn failed(page_num: usize, artifact: PathBuf, error: PageError, duration_ms: u64) -> Self {
        Self {
            page_num,
            artifact,
            primitives_found: 0,
            primitives_kept: 0,
            diagrams: Vec::new(),
            duration_ms,
            error: Some(error),
        }
    }

    /// Page was processed but yielded no diagram region. Informational only.
    pub fn found_no_diagrams(&self) -> bool {
        self.error.is_none() && self.diagrams.is_empty()
    }

    /// Diagrams whose crop and autofit both succeeded.
    pub fn exported(&self) -> usize {
        self.diagrams.iter().filter(|d| d.is_ok()).count()
    }

    /// Diagrams that failed in either stage.
    pub fn failed_diagrams(&self) -> usize {
        self.diagrams.iter().filter(|d| !d.is_ok()).count()
    }
}

/// Aggregate statistics for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the PDF.
    pub total_pages: usize,
    /// Pages selected and attempted.
    pub selected_pages: usize,
    /// Pages without a page-level failure.
    pub processed_pages: usize,
    /// Pages that failed conversion or parsing.
    pub failed_pages: usize,
    /// Processed pages on which no diagram was found.
    pub pages_without_diagrams: usize,
    pub diagrams_exported: usize,
    pub diagrams_failed: usize,
    pub primitives_kept: usize,
    pub total_duration_ms: u64,
}

impl ExtractionStats {
    pub(crate) fn from_pages(total_pages: usize, pages: &[PageReport], total_duration_ms: u64) -> Self {
        Self {
            total_pages,
            selected_pages: pages.len(),
            processed_pages: pages.iter().filter(|p| p.error.is_none()).count(),
            failed_pages: pages.iter().filter(|p| p.error.is_some()).count(),
            pages_without_diagrams: pages.iter().filter(|p| p.found_no_diagrams()).count(),
            diagrams_exported: pages.iter().map(PageReport::exported).sum(),
            diagrams_failed: pages.iter().map(PageReport::failed_diagrams).sum(),
            primitives_kept: pages.iter().map(|p| p.primitives_kept).sum(),
            total_duration_ms,
        }
    }
}

/// Document information read without running the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Outcome of processing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Document name, derived from the source file stem.
    pub name: String,
    pub source: PathBuf,
    /// `output/<name>/`.
    pub output_dir: PathBuf,
    /// Per-page reports, sorted by page number.
    pub pages: Vec<PageReport>,
    pub stats: ExtractionStats,
    /// Whether `tmp/<name>/` was removed at the end of the run.
    pub cleaned_up: bool,
}

impl DocumentReport {
    /// Paths of every fully exported diagram, in page then rank order.
    pub fn diagram_paths(&self) -> Vec<&PathBuf> {
        self.pages
            .iter()
            .flat_map(|p| p.diagrams.iter())
            .filter(|d| d.is_ok())
            .map(|d| &d.path)
            .collect()
    }

    /// Turn any page or diagram failure into an error.
    pub fn into_result(self) -> Result<Self, ExtractError> {
        if self.stats.failed_pages > 0 || self.stats.diagrams_failed > 0 {
            return Err(ExtractError::PartialFailure {
                document: self.name,
                failed_pages: self.stats.failed_pages,
                failed_diagrams: self.stats.diagrams_failed,
            });
        }
        Ok(self)
    }
}

/// A document that could not be processed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub source: PathBuf,
    pub error: String,
}

/// Outcome of processing a directory of documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusReport {
    pub documents: Vec<DocumentReport>,
    pub failures: Vec<DocumentFailure>,
    pub total_duration_ms: u64,
}

impl CorpusReport {
    pub fn diagrams_exported(&self) -> usize {
        self.documents.iter().map(|d| d.stats.diagrams_exported).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagram(page: usize, k: usize, error: Option<PageError>) -> DiagramResult {
        DiagramResult {
            page_num: page,
            diagram_num: k,
            path: PathBuf::from(format!("output/doc/page{page}_diagram{k}.svg")),
            crop_box: BoundingBox::new(0.0, 0.0, 100.0, 100.0),
            primitive_count: 1,
            cropped: true,
            error,
            duration_ms: 1,
        }
    }

    fn page(page_num: usize, diagrams: Vec<DiagramResult>) -> PageReport {
        PageReport {
            page_num,
            artifact: PathBuf::from(format!("tmp/doc/doc_page_{page_num}.svg")),
            primitives_found: diagrams.len(),
            primitives_kept: diagrams.len(),
            diagrams,
            duration_ms: 1,
            error: None,
        }
    }

    #[test]
    fn stats_count_each_category() {
        let autofit = PageError::AutofitFailed {
            page: 1,
            diagram: 2,
            retries: 1,
            detail: "exit 1".into(),
        };
        let conversion = PageError::ConversionFailed {
            page: 3,
            detail: "exit 99".into(),
        };
        let pages = vec![
            page(1, vec![diagram(1, 1, None), diagram(1, 2, Some(autofit))]),
            page(2, vec![]),
            PageReport::failed(3, PathBuf::from("tmp/doc/doc_page_3.svg"), conversion, 1),
        ];
        let stats = ExtractionStats::from_pages(3, &pages, 10);
        assert_eq!(stats.selected_pages, 3);
        assert_eq!(stats.processed_pages, 2);
        assert_eq!(stats.failed_pages, 1);
        assert_eq!(stats.pages_without_diagrams, 1);
        assert_eq!(stats.diagrams_exported, 1);
        assert_eq!(stats.diagrams_failed, 1);
    }

    #[test]
    fn failed_page_is_not_a_no_diagram_page() {
        let p = PageReport::failed(
            1,
            PathBuf::new(),
            PageError::ConversionFailed {
                page: 1,
                detail: String::new(),
            },
            0,
        );
        assert!(!p.found_no_diagrams());
        assert!(page(2, vec![]).found_no_diagrams());
    }

    #[test]
    fn into_result_flags_partial_failure() {
        let crop = PageError::CropFailed {
            page: 1,
            diagram: 1,
            detail: "boom".into(),
        };
        let pages = vec![page(1, vec![diagram(1, 1, Some(crop)), diagram(1, 2, None)])];
        let report = DocumentReport {
            name: "doc".into(),
            source: PathBuf::from("doc.pdf"),
            output_dir: PathBuf::from("output/doc"),
            stats: ExtractionStats::from_pages(1, &pages, 0),
            pages,
            cleaned_up: true,
        };
        assert_eq!(report.diagram_paths().len(), 1);
        let err = report.into_result().unwrap_err();
        assert!(matches!(
            err,
            ExtractError::PartialFailure {
                failed_diagrams: 1,
                ..
            }
        ));
    }
}

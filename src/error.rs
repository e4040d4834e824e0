//! Error types for the pdf-diagrams library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal** for one document (unreadable file, not a
//!   PDF, encrypted) or for the whole run (input directory missing, invalid
//!   configuration). Returned as `Err(ExtractError)` from the top-level
//!   `extract*` functions.
//!
//! * [`PageError`] — **Non-fatal**: one page could not be vectorised, or one
//!   diagram could not be cropped or autofitted. Stored inside
//!   [`crate::output::PageReport`] / [`crate::output::DiagramResult`] so the
//!   remaining pages and diagrams are still produced.
//!
//! A page with no diagrams is not an error at all; see
//! [`crate::output::PageReport::found_no_diagrams`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-diagrams library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The corpus directory does not exist or cannot be listed.
    #[error("Input directory '{path}' cannot be read: {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Two corpus files share a document name (`a.pdf` and `a.PDF`), so
    /// their output directories would overwrite each other.
    #[error("'{path}' maps to document name '{name}', already used by '{first}'")]
    NameCollision { path: PathBuf, name: String, first: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The PDF is encrypted and cannot be opened without a password.
    #[error("PDF '{path}' is encrypted.\nDecrypt it first, e.g. qpdf --decrypt input.pdf output.pdf")]
    Encrypted { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Some pages or diagrams failed.
    ///
    /// Returned by [`crate::output::DocumentReport::into_result`] when the
    /// caller wants to treat any page-level failure as an error.
    #[error("{failed_pages} page(s) and {failed_diagrams} diagram(s) failed in '{document}'")]
    PartialFailure {
        document: String,
        failed_pages: usize,
        failed_diagrams: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or clean a working or output directory.
    #[error("Workspace I/O failed on '{path}': {source}")]
    WorkspaceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The pipeline step a [`PageError::Timeout`] happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Vectorize,
    Crop,
    Autofit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Vectorize => "vectorize",
            Stage::Crop => "crop",
            Stage::Autofit => "autofit",
        })
    }
}

/// A non-fatal error for a single page or a single diagram.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// The page could not be converted to an intermediate vector artifact.
    #[error("Page {page}: vector conversion failed: {detail}")]
    ConversionFailed { page: usize, detail: String },

    /// The intermediate artifact exists but could not be parsed.
    #[error("Page {page}: intermediate artifact unreadable: {detail}")]
    ArtifactUnreadable { page: usize, detail: String },

    /// Cropping one diagram out of the page failed.
    #[error("Page {page}, diagram {diagram}: crop/export failed: {detail}")]
    CropFailed {
        page: usize,
        diagram: usize,
        detail: String,
    },

    /// The crop succeeded but canvas autofit failed; the un-fitted file remains.
    #[error("Page {page}, diagram {diagram}: autofit failed after {retries} retries: {detail}")]
    AutofitFailed {
        page: usize,
        diagram: usize,
        retries: u32,
        detail: String,
    },

    /// An external tool exceeded its time budget and was killed.
    #[error("Page {page}{suffix}: {stage} timed out after {secs}s", suffix = diagram_suffix(.diagram))]
    Timeout {
        stage: Stage,
        page: usize,
        diagram: Option<usize>,
        secs: u64,
    },
}

fn diagram_suffix(diagram: &Option<usize>) -> String {
    diagram.map(|d| format!(", diagram {d}")).unwrap_or_default()
}

impl PageError {
    /// 1-based page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ConversionFailed { page, .. }
            | PageError::ArtifactUnreadable { page, .. }
            | PageError::CropFailed { page, .. }
            | PageError::AutofitFailed { page, .. }
            | PageError::Timeout { page, .. } => *page,
        }
    }

    /// True when the error concerns one diagram rather than the whole page.
    pub fn is_diagram_level(&self) -> bool {
        match self {
            PageError::CropFailed { .. } | PageError::AutofitFailed { .. } => true,
            PageError::Timeout { diagram, .. } => diagram.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = ExtractError::PartialFailure {
            document: "sat-practice-1".into(),
            failed_pages: 1,
            failed_diagrams: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("1 page(s)"), "got: {msg}");
        assert!(msg.contains("sat-practice-1"), "got: {msg}");
    }

    #[test]
    fn timeout_display_page_level() {
        let e = PageError::Timeout {
            stage: Stage::Vectorize,
            page: 3,
            diagram: None,
            secs: 120,
        };
        assert_eq!(e.to_string(), "Page 3: vectorize timed out after 120s");
        assert!(!e.is_diagram_level());
    }

    #[test]
    fn timeout_display_diagram_level() {
        let e = PageError::Timeout {
            stage: Stage::Autofit,
            page: 2,
            diagram: Some(4),
            secs: 30,
        };
        assert_eq!(e.to_string(), "Page 2, diagram 4: autofit timed out after 30s");
        assert!(e.is_diagram_level());
        assert_eq!(e.page(), 2);
    }

    #[test]
    fn crop_failed_display() {
        let e = PageError::CropFailed {
            page: 5,
            diagram: 1,
            detail: "exit status 1".into(),
        };
        assert!(e.to_string().contains("diagram 1"));
        assert!(e.is_diagram_level());
    }

    #[test]
    fn page_error_serialises() {
        let e = PageError::ConversionFailed {
            page: 7,
            detail: "boom".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}

//! # pdf-diagrams
//!
//! Pull vector diagrams out of PDF pages as standalone, tightly cropped SVG
//! files.
//!
//! Exam papers, manuals and textbooks embed figures as vector paths. This
//! crate converts each page to SVG, finds the large path primitives, merges
//! the fragments of each figure into one region, then crops that region into
//! its own file and fits the canvas to the drawing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       validate %PDF magic, enumerate a corpus directory
//!  ├─ 2. Vectorize   one SVG per page via pdftocairo (page count via lopdf)
//!  ├─ 3. Primitives  drawable elements + exact bounding boxes, area filter
//!  ├─ 4. Merge       edge-alignment clustering into diagram regions
//!  ├─ 5. Export      inkscape crop, then fit canvas to drawing
//!  └─ 6. Output      output/<doc>/page<N>_diagram<K>.svg + per-page reports
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_diagrams::{extract_corpus, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // pdftocairo and inkscape must be on PATH.
//!     let config = ExtractionConfig::default();
//!     let report = extract_corpus("pdfs/", &config).await?;
//!     for doc in &report.documents {
//!         eprintln!("{}: {} diagrams", doc.name, doc.stats.diagrams_exported);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-diagrams` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-diagrams = { version = "0.1", default-features = false }
//! ```
//!
//! ## Tuning
//!
//! | Setting | Default | Effect |
//! |---------|---------|--------|
//! | `min_area` | 1000 | Primitives with a smaller box are noise (rules, glyphs) |
//! | `merge_distance` | 30 | Edge tolerance for merging fragments |
//! | `merge_mode` | one-hop | `transitive` also merges chains of fragments |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, MergeMode, PageSelection};
pub use error::{ExtractError, PageError, Stage};
pub use extract::{
    check_tools, extract, extract_corpus, extract_document, extract_document_sync, extract_sync, inspect,
    ToolCheck,
};
pub use geometry::{BoundingBox, DiagramRegion, Primitive, PrimitiveKind};
pub use output::{
    CorpusReport, DiagramResult, DocumentFailure, DocumentMetadata, DocumentReport, ExtractionStats, PageReport,
};
pub use pipeline::export::{DiagramExporter, InkscapeExporter};
pub use pipeline::vectorize::{PageConverter, PopplerConverter};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{extract_stream, PageStream};

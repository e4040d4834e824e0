//! Configuration types for diagram extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Every component receives the config
//! (or the slice of it it needs) explicitly; nothing reads process-global
//! settings, so two extractions with different thresholds can run side by
//! side in the same process.

use crate::error::ExtractError;
use crate::pipeline::export::DiagramExporter;
use crate::pipeline::vectorize::PageConverter;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a diagram extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_diagrams::{ExtractionConfig, MergeMode};
///
/// let config = ExtractionConfig::builder()
///     .min_area(1500.0)
///     .merge_distance(25.0)
///     .merge_mode(MergeMode::OneHop)
///     .cleanup(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.merge_distance, 25.0);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Minimum bounding-box area a primitive needs to take part in merging. Default: 1000.
    ///
    /// Thin rules, underlines and glyph fragments have tiny boxes; anything
    /// below this area is treated as noise.
    pub min_area: f64,

    /// Proximity distance `D` for the edge-alignment merge predicate. Default: 30.
    pub merge_distance: f64,

    /// Clustering policy. Default: [`MergeMode::OneHop`].
    pub merge_mode: MergeMode,

    /// Delete `tmp/<document>/` once every page of the document finished. Default: true.
    pub cleanup: bool,

    /// Root of the diagram output tree. Default: `output`.
    pub output_dir: PathBuf,

    /// Root of the per-document working tree. Default: `tmp`.
    pub tmp_dir: PathBuf,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Pages of one document processed at once. Default: 1 (sequential).
    ///
    /// Pages only depend on their own intermediate artifact, so raising this
    /// is safe; documents are still processed one after another.
    pub concurrency: usize,

    /// `pdftocairo` executable used by the default page converter. Default: `pdftocairo`.
    pub pdftocairo_path: PathBuf,

    /// Inkscape executable used by the default diagram exporter. Default: `inkscape`.
    pub inkscape_path: PathBuf,

    /// Upper bound for any single external tool invocation, in seconds. Default: 120.
    pub tool_timeout_secs: u64,

    /// Extra attempts for the autofit stage after a failure. Default: 1.
    ///
    /// The crop output is reused between attempts; only autofit is re-run.
    pub autofit_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Pre-constructed page converter. Takes precedence over `pdftocairo_path`.
    pub converter: Option<Arc<dyn PageConverter>>,

    /// Pre-constructed diagram exporter. Takes precedence over `inkscape_path`.
    pub exporter: Option<Arc<dyn DiagramExporter>>,

    /// Progress events receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_area: 1000.0,
            merge_distance: 30.0,
            merge_mode: MergeMode::default(),
            cleanup: true,
            output_dir: PathBuf::from("output"),
            tmp_dir: PathBuf::from("tmp"),
            pages: PageSelection::default(),
            concurrency: 1,
            pdftocairo_path: PathBuf::from("pdftocairo"),
            inkscape_path: PathBuf::from("inkscape"),
            tool_timeout_secs: 120,
            autofit_retries: 1,
            retry_backoff_ms: 500,
            converter: None,
            exporter: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("min_area", &self.min_area)
            .field("merge_distance", &self.merge_distance)
            .field("merge_mode", &self.merge_mode)
            .field("cleanup", &self.cleanup)
            .field("output_dir", &self.output_dir)
            .field("tmp_dir", &self.tmp_dir)
            .field("pages", &self.pages)
            .field("concurrency", &self.concurrency)
            .field("pdftocairo_path", &self.pdftocairo_path)
            .field("inkscape_path", &self.inkscape_path)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("autofit_retries", &self.autofit_retries)
            .field("converter", &self.converter.as_ref().map(|c| c.name().to_string()))
            .field("exporter", &self.exporter.as_ref().map(|e| e.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn min_area(mut self, area: f64) -> Self {
        self.config.min_area = area;
        self
    }

    pub fn merge_distance(mut self, distance: f64) -> Self {
        self.config.merge_distance = distance;
        self
    }

    pub fn merge_mode(mut self, mode: MergeMode) -> Self {
        self.config.merge_mode = mode;
        self
    }

    pub fn cleanup(mut self, v: bool) -> Self {
        self.config.cleanup = v;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tmp_dir = dir.into();
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn pdftocairo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftocairo_path = path.into();
        self
    }

    pub fn inkscape_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.inkscape_path = path.into();
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn autofit_retries(mut self, n: u32) -> Self {
        self.config.autofit_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn PageConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn exporter(mut self, exporter: Arc<dyn DiagramExporter>) -> Self {
        self.config.exporter = Some(exporter);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if !c.min_area.is_finite() || c.min_area < 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "Minimum area must be a finite value ≥ 0, got {}",
                c.min_area
            )));
        }
        if !c.merge_distance.is_finite() || c.merge_distance < 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "Merge distance must be a finite value ≥ 0, got {}",
                c.merge_distance
            )));
        }
        if c.tool_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "Tool timeout must be ≥ 1 second".into(),
            ));
        }
        if c.output_dir == c.tmp_dir {
            return Err(ExtractError::InvalidConfig(format!(
                "Output and temporary directories must differ (both '{}')",
                c.output_dir.display()
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How primitive boxes are grouped into diagram regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    /// Each group is the seed plus every unused box near the seed. (default)
    #[default]
    OneHop,
    /// Groups grow through any member: connected components of the proximity graph.
    Transitive,
}

/// Specifies which pages of each PDF to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Process all pages (default).
    #[default]
    All,
    /// Process a single page (1-indexed).
    Single(usize),
    /// Process a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Process specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 1-indexed page numbers.
    pub fn to_page_numbers(&self, total_pages: usize) -> Vec<usize> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![*p]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1);
                let e = (*end).min(total_pages);
                (s..=e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total_pages)
                .collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

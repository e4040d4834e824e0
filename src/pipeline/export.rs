//! Diagram export: crop one region out of a page artifact, then fit the
//! canvas of the cropped file to its drawing.
//!
//! The two steps are separate typed stages. [`crop_stage`] yields a
//! [`Cropped`] file; [`autofit_stage`] consumes it and yields
//! [`Autofitted`]. Autofit is retried on its own (the cropped file is reused),
//! with the same exponential backoff the rest of the pipeline uses:
//! `retry_backoff_ms * 2^(attempt-1)`.
//!
//! A failure in either stage is recorded on that diagram's
//! [`DiagramResult`]; sibling diagrams are unaffected.

use crate::config::ExtractionConfig;
use crate::error::{PageError, Stage};
use crate::geometry::{BoundingBox, DiagramRegion};
use crate::output::DiagramResult;
use crate::pipeline::command::{self, ToolError};
use crate::pipeline::workspace;
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Crops regions out of SVG pages and fits canvases.
#[async_trait]
pub trait DiagramExporter: Send + Sync {
    /// Short name used in logs and `Debug` output.
    fn name(&self) -> &str;

    /// Export the integer `area` of `source` to `out`.
    async fn crop(&self, source: &Path, area: &BoundingBox, out: &Path) -> Result<(), ToolError>;

    /// Resize the canvas of `file` to its drawing, in place.
    async fn autofit(&self, file: &Path) -> Result<(), ToolError>;

    /// Whether the exporter can run at all in this environment.
    async fn is_available(&self) -> bool;
}

/// Inkscape 1.x command-line exporter.
#[derive(Debug, Clone)]
pub struct InkscapeExporter {
    program: PathBuf,
    timeout: Duration,
}

impl InkscapeExporter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.inkscape_path.clone(),
            Duration::from_secs(config.tool_timeout_secs),
        )
    }
}

/// `x0:y0:x1:y1` with integer coordinates.
pub fn export_area_arg(area: &BoundingBox) -> String {
    format!(
        "{}:{}:{}:{}",
        area.x0 as i64, area.y0 as i64, area.x1 as i64, area.y1 as i64
    )
}

#[async_trait]
impl DiagramExporter for InkscapeExporter {
    fn name(&self) -> &str {
        "inkscape"
    }

    async fn crop(&self, source: &Path, area: &BoundingBox, out: &Path) -> Result<(), ToolError> {
        let mut filename = OsString::from("--export-filename=");
        filename.push(out);
        let args = [
            source.as_os_str().to_os_string(),
            OsString::from(format!("--export-area={}", export_area_arg(area))),
            OsString::from("--export-type=svg"),
            filename,
        ];
        command::run_tool(&self.program, &args, self.timeout).await?;
        command::ensure_output(&self.program, out).await
    }

    async fn autofit(&self, file: &Path) -> Result<(), ToolError> {
        let args = [
            file.as_os_str(),
            OsStr::new("--batch-process"),
            OsStr::new("--actions=object-fit-canvas-to-drawing;export-do"),
        ];
        command::run_tool(&self.program, args, self.timeout).await?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        command::responds(&self.program, "--version").await
    }
}

// ── Stages ───────────────────────────────────────────────────────────────

/// A region written to its own file, canvas not yet fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Cropped {
    pub path: PathBuf,
    pub area: BoundingBox,
}

/// A cropped file whose canvas now matches its drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Autofitted {
    pub path: PathBuf,
}

/// Crop `region` out of `source` into `out`.
pub async fn crop_stage(
    exporter: &dyn DiagramExporter,
    source: &Path,
    region: &DiagramRegion,
    out: &Path,
    page: usize,
) -> Result<Cropped, PageError> {
    let area = region.crop_box();
    workspace::remove_stale(out).await.map_err(|e| PageError::CropFailed {
        page,
        diagram: region.rank,
        detail: format!("cannot replace {}: {}", out.display(), e),
    })?;
    exporter
        .crop(source, &area, out)
        .await
        .map_err(|e| match e {
            ToolError::TimedOut { secs, .. } => PageError::Timeout {
                stage: Stage::Crop,
                page,
                diagram: Some(region.rank),
                secs,
            },
            other => PageError::CropFailed {
                page,
                diagram: region.rank,
                detail: other.to_string(),
            },
        })?;
    debug!("Page {}, diagram {}: cropped {} → {}", page, region.rank, area, out.display());
    Ok(Cropped {
        path: out.to_path_buf(),
        area,
    })
}

/// Fit the canvas of `cropped`, retrying up to `retries` extra times.
pub async fn autofit_stage(
    exporter: &dyn DiagramExporter,
    cropped: Cropped,
    page: usize,
    diagram: usize,
    retries: u32,
    retry_backoff_ms: u64,
) -> Result<Autofitted, PageError> {
    let mut last_err: Option<ToolError> = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            let backoff = retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}, diagram {}: autofit retry {}/{} after {}ms",
                page, diagram, attempt, retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match exporter.autofit(&cropped.path).await {
            Ok(()) => return Ok(Autofitted { path: cropped.path }),
            Err(e) => {
                warn!(
                    "Page {}, diagram {}: autofit attempt {} failed: {}",
                    page,
                    diagram,
                    attempt + 1,
                    e
                );
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(ToolError::TimedOut { secs, .. }) => PageError::Timeout {
            stage: Stage::Autofit,
            page,
            diagram: Some(diagram),
            secs,
        },
        other => PageError::AutofitFailed {
            page,
            diagram,
            retries,
            detail: other.map(|e| e.to_string()).unwrap_or_else(|| "Unknown error".to_string()),
        },
    })
}

/// Run both stages for one region. Never fails; the outcome is in the result.
pub async fn export_region(
    exporter: &dyn DiagramExporter,
    source: &Path,
    region: &DiagramRegion,
    out: PathBuf,
    page: usize,
    config: &ExtractionConfig,
) -> DiagramResult {
    let start = Instant::now();
    let mut result = DiagramResult {
        page_num: page,
        diagram_num: region.rank,
        path: out.clone(),
        crop_box: region.crop_box(),
        primitive_count: region.members.len(),
        cropped: false,
        error: None,
        duration_ms: 0,
    };

    match crop_stage(exporter, source, region, &out, page).await {
        Ok(cropped) => {
            result.cropped = true;
            if let Err(e) = autofit_stage(
                exporter,
                cropped,
                page,
                region.rank,
                config.autofit_retries,
                config.retry_backoff_ms,
            )
            .await
            {
                result.error = Some(e);
            }
        }
        Err(e) => result.error = Some(e),
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Writes an empty SVG on crop; autofit fails a fixed number of times.
    struct FlakyExporter {
        crops: AtomicU32,
        autofits: AtomicU32,
        autofit_failures: u32,
        crop_fails: bool,
    }

    impl FlakyExporter {
        fn new(autofit_failures: u32, crop_fails: bool) -> Self {
            Self {
                crops: AtomicU32::new(0),
                autofits: AtomicU32::new(0),
                autofit_failures,
                crop_fails,
            }
        }
    }

    #[async_trait]
    impl DiagramExporter for FlakyExporter {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn crop(&self, _source: &Path, _area: &BoundingBox, out: &Path) -> Result<(), ToolError> {
            self.crops.fetch_add(1, Ordering::SeqCst);
            if self.crop_fails {
                return Err(ToolError::Failed {
                    program: "flaky".into(),
                    status: "exit status: 1".into(),
                    stderr: "cannot export".into(),
                });
            }
            tokio::fs::write(out, b"<svg/>").await.unwrap();
            Ok(())
        }

        async fn autofit(&self, _file: &Path) -> Result<(), ToolError> {
            let n = self.autofits.fetch_add(1, Ordering::SeqCst);
            if n < self.autofit_failures {
                Err(ToolError::TimedOut {
                    program: "flaky".into(),
                    secs: 1,
                })
            } else {
                Ok(())
            }
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn region() -> DiagramRegion {
        DiagramRegion {
            rank: 2,
            bbox: BoundingBox::new(-3.5, 10.9, 200.2, 300.7),
            members: vec![0, 4, 5],
        }
    }

    fn config(retries: u32) -> ExtractionConfig {
        ExtractionConfig::builder()
            .autofit_retries(retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[test]
    fn export_area_uses_integers() {
        assert_eq!(
            export_area_arg(&region().crop_box()),
            "0:10:200:300"
        );
    }

    #[tokio::test]
    async fn autofit_retry_reuses_the_crop() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FlakyExporter::new(1, false);
        let out = dir.path().join("page1_diagram2.svg");

        let result = export_region(&exporter, Path::new("page.svg"), &region(), out.clone(), 1, &config(1)).await;

        assert!(result.is_ok(), "{:?}", result.error);
        assert_eq!(exporter.crops.load(Ordering::SeqCst), 1);
        assert_eq!(exporter.autofits.load(Ordering::SeqCst), 2);
        assert_eq!(result.primitive_count, 3);
        assert_eq!(result.crop_box, BoundingBox::new(0.0, 10.0, 200.0, 300.0));
        assert!(out.exists());
    }

    #[tokio::test]
    async fn exhausted_autofit_timeout_is_reported_as_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FlakyExporter::new(5, false);
        let out = dir.path().join("page1_diagram2.svg");

        let result = export_region(&exporter, Path::new("page.svg"), &region(), out.clone(), 1, &config(2)).await;

        assert!(result.cropped);
        assert_eq!(exporter.autofits.load(Ordering::SeqCst), 3);
        assert_eq!(
            result.error,
            Some(PageError::Timeout {
                stage: Stage::Autofit,
                page: 1,
                diagram: Some(2),
                secs: 1,
            })
        );
        // The un-fitted crop stays on disk.
        assert!(out.exists());
    }

    #[tokio::test]
    async fn crop_failure_skips_autofit() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FlakyExporter::new(0, true);
        let out = dir.path().join("page3_diagram2.svg");

        let result = export_region(&exporter, Path::new("page.svg"), &region(), out, 3, &config(1)).await;

        assert!(!result.cropped);
        assert_eq!(exporter.autofits.load(Ordering::SeqCst), 0);
        assert!(matches!(
            result.error,
            Some(PageError::CropFailed { page: 3, diagram: 2, .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_tool_cannot_pass_off_an_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("page1_diagram2.svg");
        std::fs::write(&out, "<svg>from an earlier run</svg>").unwrap();
        // `true` exits 0 without writing anything.
        let exporter = InkscapeExporter::new("true", Duration::from_secs(5));

        let result = export_region(&exporter, Path::new("page.svg"), &region(), out.clone(), 1, &config(0)).await;

        assert!(!result.cropped);
        assert!(matches!(
            result.error,
            Some(PageError::CropFailed { page: 1, diagram: 2, .. })
        ));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn missing_inkscape_fails_crop() {
        let exporter = InkscapeExporter::new("/nonexistent/inkscape", Duration::from_secs(5));
        assert!(!exporter.is_available().await);
        let err = crop_stage(&exporter, Path::new("page.svg"), &region(), Path::new("out.svg"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::CropFailed { .. }));
    }
}

//! Page vectorisation: turn one PDF page into an intermediate SVG.
//!
//! The [`PageConverter`] trait is the seam for the conversion tool. The
//! default [`PopplerConverter`] shells out to `pdftocairo -svg` once per
//! page, so pages stay independent of each other and a failure on one page
//! only costs that page.
//!
//! Page counting and document metadata come from `lopdf`, which parses the
//! file in-process on the blocking pool.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, PageError, Stage};
use crate::output::DocumentMetadata;
use crate::pipeline::command::{self, ToolError};
use async_trait::async_trait;
use lopdf::{Document, Object};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Converts single PDF pages into SVG artifacts.
#[async_trait]
pub trait PageConverter: Send + Sync {
    /// Short name used in logs and `Debug` output.
    fn name(&self) -> &str;

    /// Number of pages in `pdf`.
    async fn page_count(&self, pdf: &Path) -> Result<usize, ExtractError> {
        Ok(read_metadata(pdf).await?.page_count)
    }

    /// Write page `page` (1-based) of `pdf` to `out` as SVG.
    async fn convert_page(&self, pdf: &Path, page: usize, out: &Path) -> Result<(), PageError>;

    /// Whether the converter can run at all in this environment.
    async fn is_available(&self) -> bool;
}

/// `pdftocairo -svg -f N -l N <pdf> <out>` from poppler-utils.
#[derive(Debug, Clone)]
pub struct PopplerConverter {
    program: PathBuf,
    timeout: Duration,
}

impl PopplerConverter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.pdftocairo_path.clone(),
            Duration::from_secs(config.tool_timeout_secs),
        )
    }

    fn page_error(&self, page: usize, err: ToolError) -> PageError {
        match err {
            ToolError::TimedOut { secs, .. } => PageError::Timeout {
                stage: Stage::Vectorize,
                page,
                diagram: None,
                secs,
            },
            other => PageError::ConversionFailed {
                page,
                detail: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl PageConverter for PopplerConverter {
    fn name(&self) -> &str {
        "pdftocairo"
    }

    async fn convert_page(&self, pdf: &Path, page: usize, out: &Path) -> Result<(), PageError> {
        let n = page.to_string();
        let args = [
            OsStr::new("-svg"),
            OsStr::new("-f"),
            OsStr::new(&n),
            OsStr::new("-l"),
            OsStr::new(&n),
            pdf.as_os_str(),
            out.as_os_str(),
        ];
        command::run_tool(&self.program, args, self.timeout)
            .await
            .map_err(|e| self.page_error(page, e))?;
        command::ensure_output(&self.program, out)
            .await
            .map_err(|e| self.page_error(page, e))?;
        debug!("Page {} → {}", page, out.display());
        Ok(())
    }

    async fn is_available(&self) -> bool {
        command::responds(&self.program, "-v").await
    }
}

/// Read page count and Info-dictionary metadata without vectorising.
pub async fn read_metadata(pdf: &Path) -> Result<DocumentMetadata, ExtractError> {
    let path = pdf.to_path_buf();
    tokio::task::spawn_blocking(move || read_metadata_blocking(&path))
        .await
        .map_err(|e| ExtractError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn read_metadata_blocking(pdf: &Path) -> Result<DocumentMetadata, ExtractError> {
    let document = Document::load(pdf).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("ecrypt") || err_str.contains("assword") {
            ExtractError::Encrypted {
                path: pdf.to_path_buf(),
            }
        } else {
            ExtractError::CorruptPdf {
                path: pdf.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let page_count = document.get_pages().len();
    info!("PDF loaded: {} pages ({})", page_count, pdf.display());

    let info = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| obj.as_reference().ok())
        .and_then(|id| document.get_object(id).ok());

    let get_string = |key: &[u8]| -> Option<String> {
        let Some(Object::Dictionary(dict)) = info else {
            return None;
        };
        match dict.get(key).ok()? {
            Object::String(bytes, _) => {
                let v = String::from_utf8(bytes.clone())
                    .unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect());
                let v = v.trim().to_string();
                (!v.is_empty()).then_some(v)
            }
            _ => None,
        }
    };

    Ok(DocumentMetadata {
        title: get_string(b"Title"),
        author: get_string(b"Author"),
        subject: get_string(b"Subject"),
        creator: get_string(b"Creator"),
        producer: get_string(b"Producer"),
        page_count,
        pdf_version: document.version.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn write_pdf(path: &Path, pages: usize, title: Option<&str>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title),
            });
            doc.trailer.set("Info", info_id);
        }
        doc.save(path).unwrap();
    }

    #[tokio::test]
    async fn metadata_reports_pages_and_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("practice.pdf");
        write_pdf(&path, 3, Some("Practice Test 1"));

        let meta = read_metadata(&path).await.unwrap();
        assert_eq!(meta.page_count, 3);
        assert_eq!(meta.title.as_deref(), Some("Practice Test 1"));
        assert_eq!(meta.author, None);
        assert_eq!(meta.pdf_version, "1.5");
    }

    #[tokio::test]
    async fn default_page_count_uses_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.pdf");
        write_pdf(&path, 2, None);

        let converter = PopplerConverter::new("pdftocairo", Duration::from_secs(5));
        assert_eq!(converter.page_count(&path).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"%PDF-1.4\nthis is not a real pdf").unwrap();
        let err = read_metadata(&path).await.unwrap_err();
        assert!(matches!(err, ExtractError::CorruptPdf { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_tool_fails_the_page() {
        let converter = PopplerConverter::new("/nonexistent/pdftocairo", Duration::from_secs(5));
        assert!(!converter.is_available().await);
        let err = converter
            .convert_page(Path::new("doc.pdf"), 2, Path::new("out.svg"))
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::ConversionFailed { page: 2, .. }));
    }
}

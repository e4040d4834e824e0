//! Input resolution: enumerate a corpus directory and validate single PDFs.
//!
//! Documents are validated before any tool runs: the file must exist, be
//! readable, and start with the `%PDF` magic bytes, so callers get a
//! meaningful error instead of a converter failure on every page.

use crate::error::ExtractError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Every `.pdf` file (extension matched case-insensitively) directly inside
/// `dir`, sorted by file name.
pub async fn list_documents(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let unreadable = |source| ExtractError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;
    let mut documents = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && has_pdf_extension(&path) {
            documents.push(path);
        }
    }
    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} PDFs in {}", documents.len(), dir.display());
    Ok(documents)
}

pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Document name used for the working and output directories: the file stem.
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Validate a local file: it exists, is readable, and looks like a PDF.
pub fn resolve_document(path: &Path) -> Result<PathBuf, ExtractError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(ExtractError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => {}
                Ok(()) => return Err(ExtractError::NotAPdf { path, magic }),
                // Shorter than the magic itself.
                Err(_) => return Err(ExtractError::NotAPdf { path, magic }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_name_is_stem() {
        assert_eq!(document_name(Path::new("/data/SAT Practice 1.pdf")), "SAT Practice 1");
        assert_eq!(document_name(Path::new("exam.PDF")), "exam");
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert!(has_pdf_extension(Path::new("a.pdf")));
        assert!(has_pdf_extension(Path::new("a.PDF")));
        assert!(!has_pdf_extension(Path::new("a.pdf.txt")));
        assert!(!has_pdf_extension(Path::new("pdf")));
    }

    #[tokio::test]
    async fn list_documents_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf"] {
            std::fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let docs = list_documents(dir.path()).await.unwrap();
        let names: Vec<String> = docs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "c.pdf"]);
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let err = list_documents(Path::new("/nonexistent/corpus")).await.unwrap_err();
        assert!(matches!(err, ExtractError::InputDirUnreadable { .. }));
    }

    #[test]
    fn resolve_checks_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("bad.pdf");
        let tiny = dir.path().join("tiny.pdf");
        std::fs::write(&good, b"%PDF-1.7\n").unwrap();
        std::fs::write(&bad, b"PK\x03\x04zip").unwrap();
        std::fs::write(&tiny, b"%P").unwrap();

        assert_eq!(resolve_document(&good).unwrap(), good);
        assert!(matches!(
            resolve_document(&bad),
            Err(ExtractError::NotAPdf { magic, .. }) if &magic == b"PK\x03\x04"
        ));
        assert!(matches!(resolve_document(&tiny), Err(ExtractError::NotAPdf { .. })));
        assert!(matches!(
            resolve_document(&dir.path().join("missing.pdf")),
            Err(ExtractError::FileNotFound { .. })
        ));
    }
}

//! Per-document directory layout.
//!
//! ```text
//! tmp/<doc>/<doc>_page_<N>.svg        intermediate page artifacts
//! output/<doc>/page<N>_diagram<K>.svg exported diagrams
//! ```
//!
//! Every page writes only its own file names, so pages can run
//! concurrently. The working directory is removed by [`DocumentWorkspace::cleanup`]
//! once every page of the document has finished.
//!
//! Files left by an earlier run are removed before they are regenerated: a
//! page's old diagrams go in [`DocumentWorkspace::clear_page_outputs`], and
//! each target file goes in [`remove_stale`] right before its tool runs.

use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

static RE_DIAGRAM_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page(\d+)_diagram\d+\.svg$").unwrap());

#[derive(Debug, Clone)]
pub struct DocumentWorkspace {
    name: String,
    tmp_dir: PathBuf,
    out_dir: PathBuf,
}

impl DocumentWorkspace {
    pub fn new(name: impl Into<String>, tmp_root: &Path, output_root: &Path) -> Self {
        let name = name.into();
        Self {
            tmp_dir: tmp_root.join(&name),
            out_dir: output_root.join(&name),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// `tmp/<doc>/<doc>_page_<N>.svg`
    pub fn page_artifact(&self, page: usize) -> PathBuf {
        self.tmp_dir.join(format!("{}_page_{}.svg", self.name, page))
    }

    /// `output/<doc>/page<N>_diagram<K>.svg`
    pub fn diagram_artifact(&self, page: usize, diagram: usize) -> PathBuf {
        self.out_dir.join(format!("page{}_diagram{}.svg", page, diagram))
    }

    /// Create both directories.
    pub async fn prepare(&self) -> Result<(), ExtractError> {
        for dir in [&self.tmp_dir, &self.out_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ExtractError::WorkspaceIo {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Remove the working directory. A directory that is already gone is fine.
    pub async fn cleanup(&self) -> Result<(), ExtractError> {
        match tokio::fs::remove_dir_all(&self.tmp_dir).await {
            Ok(()) => {
                debug!("Removed {}", self.tmp_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExtractError::WorkspaceIo {
                path: self.tmp_dir.clone(),
                source: e,
            }),
        }
    }

    /// Remove every `page<N>_diagram<K>.svg` of page `page` from the output
    /// directory. Returns how many files were removed; a missing directory
    /// counts as empty.
    pub async fn clear_page_outputs(&self, page: usize) -> Result<usize, ExtractError> {
        let io_err = |source| ExtractError::WorkspaceIo {
            path: self.out_dir.clone(),
            source,
        };
        let mut entries = match tokio::fs::read_dir(&self.out_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_err(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let file_name = entry.file_name();
            let belongs_to_page = RE_DIAGRAM_FILE
                .captures(&file_name.to_string_lossy())
                .and_then(|c| c[1].parse::<usize>().ok())
                == Some(page);
            if belongs_to_page {
                remove_stale(&entry.path()).await.map_err(io_err)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Delete `path` if it exists, so a tool that writes nothing cannot leave
/// an old file looking like fresh output.
pub async fn remove_stale(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

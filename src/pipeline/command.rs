//! Bounded external tool invocation.
//!
//! Every call to an external converter or exporter goes through
//! [`run_tool`], which enforces a wall-clock timeout. The child is spawned
//! with `kill_on_drop`, so when the timeout fires and the output future is
//! dropped the process is killed instead of being left running.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Why an external tool invocation failed.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be started (not installed, not executable).
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program exceeded its time budget and was killed.
    #[error("'{program}' timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },

    /// The program ran and exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The program reported success but its output file is missing.
    #[error("'{program}' did not write '{path}'")]
    MissingOutput { program: String, path: PathBuf },
}

impl ToolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::TimedOut { .. })
    }
}

/// Run `program` with `args`, waiting at most `timeout`.
///
/// stdout is discarded; stderr is captured for the error message.
pub async fn run_tool<I, S>(program: &Path, args: I, timeout: Duration) -> Result<Output, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {:?}", cmd.as_std());

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(|source| ToolError::Spawn {
            program: name.clone(),
            source,
        })?,
        Err(_) => {
            return Err(ToolError::TimedOut {
                program: name,
                secs: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: name,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Upper bound for an availability check. A healthy `--version` answers in
/// well under a second.
pub const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(10);

/// True when `program arg` starts and exits successfully within [`AVAILABILITY_TIMEOUT`].
pub async fn responds(program: &Path, arg: &str) -> bool {
    responds_within(program, arg, AVAILABILITY_TIMEOUT).await
}

/// [`responds`] with an explicit time budget.
pub async fn responds_within(program: &Path, arg: &str, timeout: Duration) -> bool {
    match run_tool(program, [arg], timeout).await {
        Ok(_) => true,
        Err(e) if e.is_timeout() => {
            warn!("{} did not answer '{}' in time; treating it as unavailable", program.display(), arg);
            false
        }
        Err(e) => {
            debug!("Availability check failed: {}", e);
            false
        }
    }
}

/// Confirm a tool actually produced `path` after reporting success.
pub async fn ensure_output(program: &Path, path: &Path) -> Result<(), ToolError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(ToolError::MissingOutput {
            program: program.display().to_string(),
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh() -> &'static Path {
        Path::new("sh")
    }

    #[tokio::test]
    async fn success_returns_output() {
        let out = run_tool(sh(), ["-c", "exit 0"], Duration::from_secs(5)).await;
        assert!(out.is_ok());
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let err = run_tool(sh(), ["-c", "echo broken >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            ToolError::Failed { status, stderr, .. } => {
                assert!(status.contains('3'), "status: {status}");
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn hung_tool_is_killed_on_timeout() {
        let start = Instant::now();
        let err = run_tool(sh(), ["-c", "sleep 30"], Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn hung_tool_reports_unavailable() {
        let start = Instant::now();
        assert!(!responds_within(Path::new("sleep"), "30", Duration::from_millis(200)).await);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(responds_within(Path::new("sleep"), "0", Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = run_tool(
            Path::new("/nonexistent/definitely-not-a-tool"),
            ["--version"],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
        assert!(!responds(Path::new("/nonexistent/definitely-not-a-tool"), "--version").await);
    }

    #[tokio::test]
    async fn ensure_output_detects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.svg");
        assert!(ensure_output(sh(), &path).await.is_err());
        tokio::fs::write(&path, b"<svg/>").await.unwrap();
        assert!(ensure_output(sh(), &path).await.is_ok());
    }
}

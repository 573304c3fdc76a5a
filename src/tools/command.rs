//! Running external converters (LibreOffice, Tesseract)

use super::error::{ToolError, ToolResult};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;

/// Longest stderr excerpt carried into error messages
const STDERR_EXCERPT: usize = 500;

/// Run `program` with `args`, killing it after `timeout`. Returns stdout.
pub async fn run<I, S>(label: &str, program: &str, args: I, timeout: Duration) -> ToolResult<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let started = Instant::now();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => {
            tracing::warn!(program, timeout_secs = timeout.as_secs(), "{} timed out", label);
            return Err(ToolError::Timeout {
                what: label.to_string(),
                secs: timeout.as_secs(),
            });
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(program, "{} is not installed", label);
            return Err(ToolError::external(format!(
                "{} is not available on this server",
                label
            )));
        }
        Ok(Err(e)) => {
            tracing::warn!(program, error = %e, "Failed to start {}", label);
            return Err(ToolError::external(format!("Failed to start {}: {}", label, e)));
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
        tracing::warn!(
            program,
            status = ?output.status.code(),
            stderr = %excerpt,
            "{} failed",
            label
        );
        return Err(ToolError::external(if excerpt.is_empty() {
            format!("{} failed", label)
        } else {
            format!("{} failed: {}", label, excerpt)
        }));
    }

    tracing::debug!(program, elapsed_ms = started.elapsed().as_millis() as u64, "{} finished", label);
    Ok(output.stdout)
}

/// Scratch directory for one conversion, removed on drop
pub fn scratch_dir(base: Option<&Path>) -> ToolResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("paperdesk-");
    let dir = match base {
        Some(base) => {
            std::fs::create_dir_all(base)?;
            builder.tempdir_in(base)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Write `bytes` as `<dir>/<stem>.<ext>` and return the path
pub fn write_input(dir: &Path, stem: &str, ext: &str, bytes: &[u8]) -> ToolResult<PathBuf> {
    let path = dir.join(format!("{}.{}", stem, ext));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

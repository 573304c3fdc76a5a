//! Document conversion through headless LibreOffice

use super::command::{run, scratch_dir, write_input};
use super::error::{ToolError, ToolResult};
use crate::config::ToolsConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions `convert` may target
pub const CONVERT_TARGETS: &[&str] = &[
    "pdf", "docx", "doc", "odt", "rtf", "txt", "html", "xlsx", "xls", "ods", "csv", "pptx", "ppt", "odp",
];

/// One conversion request
#[derive(Debug, Clone)]
pub struct Conversion<'a> {
    pub input: &'a [u8],
    /// Extension of the input file, without the dot
    pub input_ext: &'a str,
    pub target_ext: &'a str,
    /// LibreOffice export filter, appended as `ext:filter`
    pub export_filter: Option<&'a str>,
    /// Import filter, e.g. to open PDFs in Writer instead of Draw
    pub import_filter: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct OfficeConverter {
    program: String,
    timeout: Duration,
    work_dir: Option<PathBuf>,
}

impl OfficeConverter {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            program: config.libreoffice_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            work_dir: config.work_dir.clone(),
        }
    }

    /// Convert a document and return the bytes of the result
    pub async fn convert(&self, job: Conversion<'_>) -> ToolResult<Vec<u8>> {
        let target = job.target_ext.trim().trim_start_matches('.').to_ascii_lowercase();
        if !CONVERT_TARGETS.contains(&target.as_str()) {
            return Err(ToolError::UnsupportedFormat(format!("cannot convert to '{}'", target)));
        }
        if !is_safe_extension(job.input_ext) {
            return Err(ToolError::invalid("Invalid input file extension"));
        }

        let dir = scratch_dir(self.work_dir.as_deref())?;
        let input = write_input(dir.path(), "input", job.input_ext, job.input)?;
        let out_dir = dir.path().join("out");
        std::fs::create_dir_all(&out_dir)?;

        let convert_to = match job.export_filter {
            Some(filter) => format!("{}:{}", target, filter),
            None => target.clone(),
        };
        // Separate profile per run so concurrent conversions don't fight over the lock
        let profile = format!("-env:UserInstallation=file://{}", dir.path().join("profile").display());

        let mut args: Vec<String> = vec![
            "--headless".into(),
            "--norestore".into(),
            "--nolockcheck".into(),
            profile,
        ];
        if let Some(filter) = job.import_filter {
            args.push(format!("--infilter={}", filter));
        }
        args.extend([
            "--convert-to".into(),
            convert_to,
            "--outdir".into(),
            out_dir.display().to_string(),
            input.display().to_string(),
        ]);

        run("LibreOffice", &self.program, &args, self.timeout).await?;

        let output = find_output(&out_dir, &target)?;
        let bytes = std::fs::read(&output)?;
        if bytes.is_empty() {
            return Err(ToolError::external("LibreOffice produced an empty file"));
        }
        Ok(bytes)
    }
}

fn find_output(dir: &Path, ext: &str) -> ToolResult<PathBuf> {
    std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .ok_or_else(|| ToolError::external("LibreOffice did not produce an output file"))
}

fn is_safe_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// File extension for common document MIME types
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let ext = match mime.split(';').next().unwrap_or_default().trim() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.oasis.opendocument.text" => "odt",
        "application/rtf" | "text/rtf" => "rtf",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.oasis.opendocument.spreadsheet" => "ods",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/vnd.oasis.opendocument.presentation" => "odp",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        _ => return None,
    };
    Some(ext)
}

/// MIME type for a conversion target
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "odt" => "application/vnd.oasis.opendocument.text",
        "rtf" => "application/rtf",
        "txt" => "text/plain",
        "html" => "text/html",
        "csv" => "text/csv",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        _ => "application/octet-stream",
    }
}

/// Extension from a file name, when it has a sane one
pub fn extension_from_name(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| is_safe_extension(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> OfficeConverter {
        OfficeConverter::new(&ToolsConfig::default())
    }

    #[test]
    fn test_mime_mapping() {
        assert_eq!(extension_for_mime("application/pdf"), Some("pdf"));
        assert_eq!(extension_for_mime("text/csv; charset=utf-8"), Some("csv"));
        assert_eq!(extension_for_mime("application/x-unknown"), None);
        assert_eq!(extension_for_mime(mime_for_extension("docx")), Some("docx"));
        assert_eq!(mime_for_extension("zzz"), "application/octet-stream");
        assert_eq!(extension_from_name("Report.DOCX").as_deref(), Some("docx"));
        assert_eq!(extension_from_name("noext"), None);
        assert_eq!(extension_from_name("bad.d/x"), None);
    }

    #[tokio::test]
    async fn test_rejects_unknown_target() {
        let job = Conversion {
            input: b"hello",
            input_ext: "txt",
            target_ext: "exe",
            export_filter: None,
            import_filter: None,
        };
        assert!(matches!(converter().convert(job).await, Err(ToolError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    #[ignore = "needs LibreOffice installed"]
    async fn test_text_to_pdf() {
        let job = Conversion {
            input: b"Hello from paperdesk",
            input_ext: "txt",
            target_ext: "pdf",
            export_filter: None,
            import_filter: None,
        };
        let pdf = converter().convert(job).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}

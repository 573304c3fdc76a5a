//! OCR through the `tesseract` command-line tool

use super::command::{run, scratch_dir, write_input};
use super::error::{ToolError, ToolResult};
use crate::config::ToolsConfig;
use image::ImageFormat;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: String,
    default_language: String,
    timeout: Duration,
    work_dir: Option<PathBuf>,
}

impl TesseractOcr {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            program: config.tesseract_path.clone(),
            default_language: config.ocr_language.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            work_dir: config.work_dir.clone(),
        }
    }

    /// Recognise the text of an image. `language` is a tesseract language
    /// code or a `+`-joined list such as `eng+hin`.
    pub async fn recognize(&self, image: &[u8], language: Option<&str>, psm: Option<u8>) -> ToolResult<String> {
        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.default_language.as_str());
        if !is_valid_language(language) {
            return Err(ToolError::invalid(format!("Invalid OCR language '{}'", language)));
        }
        if let Some(psm) = psm {
            if psm > 13 {
                return Err(ToolError::invalid("Page segmentation mode must be between 0 and 13"));
            }
        }

        let ext = match image::guess_format(image) {
            Ok(ImageFormat::Png) => "png",
            Ok(ImageFormat::Jpeg) => "jpg",
            Ok(ImageFormat::Tiff) => "tif",
            Ok(ImageFormat::Bmp) => "bmp",
            Ok(ImageFormat::WebP) => "webp",
            Ok(ImageFormat::Gif) => "gif",
            _ => return Err(ToolError::UnsupportedFormat("OCR needs a PNG, JPEG, TIFF, BMP, WebP or GIF image".into())),
        };

        let dir = scratch_dir(self.work_dir.as_deref())?;
        let input = write_input(dir.path(), "page", ext, image)?;

        let mut args = vec![
            input.display().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            language.to_string(),
        ];
        if let Some(psm) = psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }

        let stdout = run("Tesseract", &self.program, &args, self.timeout).await?;
        Ok(normalize_ocr_text(&String::from_utf8_lossy(&stdout)))
    }
}

/// Language codes are lowercase letters and underscores, joined by `+`
pub fn is_valid_language(language: &str) -> bool {
    !language.is_empty()
        && language.len() <= 64
        && language.split('+').all(|code| {
            code.len() >= 3 && code.chars().all(|c| c.is_ascii_lowercase() || c == '_')
        })
}

/// Trim trailing whitespace per line, drop form feeds and collapse runs of
/// blank lines
pub fn normalize_ocr_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.replace('\u{c}', "").lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

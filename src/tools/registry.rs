//! Tool registry
//!
//! Static metadata for every tool the service offers. The list backs
//! `GET /api/v1/tools`, input-count checks and slug validation elsewhere.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Pdf,
    Image,
    Office,
    Ocr,
}

/// External collaborator a tool needs at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    Libreoffice,
    Tesseract,
    Ai,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub slug: &'static str,
    pub name: &'static str,
    pub category: ToolCategory,
    /// Accepted MIME types; `image/*` matches any image
    pub accepts: &'static [&'static str],
    pub min_files: usize,
    /// `None` means up to the configured `tools.max_files`
    pub max_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requirement>,
}

impl ToolInfo {
    pub fn accepts_mime(&self, mime: &str) -> bool {
        self.accepts.iter().any(|pattern| mime_matches(pattern, mime))
    }

    /// Effective maximum given the configured cap
    pub fn max_files_with(&self, configured: usize) -> usize {
        self.max_files.unwrap_or(configured).min(configured.max(1))
    }
}

const PDF: &[&str] = &["application/pdf"];
const IMAGES: &[&str] = &["image/*"];
const WORD: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.oasis.opendocument.text",
    "application/rtf",
    "text/rtf",
    "text/plain",
];
const EXCEL: &[&str] = &[
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.oasis.opendocument.spreadsheet",
    "text/csv",
];
const POWERPOINT: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.presentation",
];
const ANY_DOCUMENT: &[&str] = &["application/*", "text/*", "image/*"];
const OCR_INPUT: &[&str] = &["image/*", "text/plain"];

macro_rules! tool {
    ($slug:literal, $name:literal, $cat:ident, $accepts:expr, $min:expr, $max:expr) => {
        tool!($slug, $name, $cat, $accepts, $min, $max, None)
    };
    ($slug:literal, $name:literal, $cat:ident, $accepts:expr, $min:expr, $max:expr, $req:expr) => {
        ToolInfo {
            slug: $slug,
            name: $name,
            category: ToolCategory::$cat,
            accepts: $accepts,
            min_files: $min,
            max_files: $max,
            requires: $req,
        }
    };
}

pub static TOOLS: &[ToolInfo] = &[
    tool!("merge-pdf", "Merge PDF", Pdf, PDF, 2, None),
    tool!("split-pdf", "Split PDF", Pdf, PDF, 1, Some(1)),
    tool!("extract-pages", "Extract Pages", Pdf, PDF, 1, Some(1)),
    tool!("remove-pages", "Remove Pages", Pdf, PDF, 1, Some(1)),
    tool!("rotate-pdf", "Rotate PDF", Pdf, PDF, 1, Some(1)),
    tool!("compress-pdf", "Compress PDF", Pdf, PDF, 1, Some(1)),
    tool!("watermark-pdf", "Watermark PDF", Pdf, PDF, 1, Some(1)),
    tool!("add-page-numbers", "Add Page Numbers", Pdf, PDF, 1, Some(1)),
    tool!("unlock-pdf", "Unlock PDF", Pdf, PDF, 1, Some(1)),
    tool!("pdf-to-text", "PDF to Text", Pdf, PDF, 1, Some(1)),
    tool!("pdf-info", "PDF Info", Pdf, PDF, 1, Some(1)),
    tool!("images-to-pdf", "Images to PDF", Pdf, IMAGES, 1, None),
    tool!("compress-image", "Compress Image", Image, IMAGES, 1, Some(1)),
    tool!("resize-image", "Resize Image", Image, IMAGES, 1, Some(1)),
    tool!("convert-image", "Convert Image", Image, IMAGES, 1, Some(1)),
    tool!("rotate-image", "Rotate Image", Image, IMAGES, 1, Some(1)),
    tool!("flip-image", "Flip Image", Image, IMAGES, 1, Some(1)),
    tool!("crop-image", "Crop Image", Image, IMAGES, 1, Some(1)),
    tool!("grayscale-image", "Grayscale Image", Image, IMAGES, 1, Some(1)),
    tool!("word-to-pdf", "Word to PDF", Office, WORD, 1, Some(1), Some(Requirement::Libreoffice)),
    tool!("excel-to-pdf", "Excel to PDF", Office, EXCEL, 1, Some(1), Some(Requirement::Libreoffice)),
    tool!(
        "powerpoint-to-pdf",
        "PowerPoint to PDF",
        Office,
        POWERPOINT,
        1,
        Some(1),
        Some(Requirement::Libreoffice)
    ),
    tool!("pdf-to-word", "PDF to Word", Office, PDF, 1, Some(1), Some(Requirement::Libreoffice)),
    tool!("convert", "Convert Document", Office, ANY_DOCUMENT, 1, Some(1), Some(Requirement::Libreoffice)),
    tool!("ocr-image", "Image to Text (OCR)", Ocr, IMAGES, 1, Some(1), Some(Requirement::Tesseract)),
    tool!("ai-ocr", "AI Text Recognition", Ocr, IMAGES, 1, Some(1), Some(Requirement::Ai)),
    tool!("voter-extract", "Voter List Extractor", Ocr, OCR_INPUT, 0, Some(1)),
];

pub fn all() -> &'static [ToolInfo] {
    TOOLS
}

pub fn find(slug: &str) -> Option<&'static ToolInfo> {
    TOOLS.iter().find(|t| t.slug == slug)
}

pub fn is_known(slug: &str) -> bool {
    find(slug).is_some()
}

/// `type/*` wildcard match, case-insensitive
pub fn mime_matches(pattern: &str, mime: &str) -> bool {
    let mime = mime.split(';').next().unwrap_or_default().trim();
    match pattern.strip_suffix("/*") {
        Some(prefix) => mime
            .split_once('/')
            .is_some_and(|(kind, _)| kind.eq_ignore_ascii_case(prefix)),
        None => pattern.eq_ignore_ascii_case(mime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slugs_are_unique() {
        let slugs: HashSet<_> = TOOLS.iter().map(|t| t.slug).collect();
        assert_eq!(slugs.len(), TOOLS.len());
    }

    #[test]
    fn test_find() {
        assert!(is_known("merge-pdf"));
        assert!(is_known("ocr-image"));
        assert!(!is_known("fax-pdf"));
        let merge = find("merge-pdf").unwrap();
        assert_eq!(merge.min_files, 2);
        assert_eq!(merge.category, ToolCategory::Pdf);
        assert_eq!(find("word-to-pdf").unwrap().requires, Some(Requirement::Libreoffice));
    }

    #[test]
    fn test_mime_matching() {
        assert!(mime_matches("image/*", "image/png"));
        assert!(mime_matches("image/*", "IMAGE/JPEG"));
        assert!(!mime_matches("image/*", "application/pdf"));
        assert!(mime_matches("application/pdf", "application/pdf; charset=binary"));
        assert!(find("images-to-pdf").unwrap().accepts_mime("image/webp"));
        assert!(!find("compress-pdf").unwrap().accepts_mime("image/webp"));
    }

    #[test]
    fn test_max_files() {
        assert_eq!(find("merge-pdf").unwrap().max_files_with(20), 20);
        assert_eq!(find("split-pdf").unwrap().max_files_with(20), 1);
    }

    #[test]
    fn test_serialises_for_listing() {
        let json = serde_json::to_value(find("ai-ocr").unwrap()).unwrap();
        assert_eq!(json["category"], "ocr");
        assert_eq!(json["requires"], "ai");
        assert_eq!(json["accepts"][0], "image/*");
        let json = serde_json::to_value(find("merge-pdf").unwrap()).unwrap();
        assert!(json.get("requires").is_none());
        assert!(json["max_files"].is_null());
    }
}

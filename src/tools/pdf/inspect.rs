//! Read-only tools: text extraction and document information

use super::{load, load_raw, media_box, page_rotation, resolve};
use crate::tools::error::ToolResult;
use lopdf::{Document, Object};
use serde::Serialize;
use std::collections::BTreeMap;

const INFO_KEYS: &[&str] = &[
    "Title",
    "Author",
    "Subject",
    "Keywords",
    "Creator",
    "Producer",
    "CreationDate",
    "ModDate",
];

#[derive(Debug, Clone, Serialize)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// Text of every page. Pages lopdf cannot decode yield empty text.
pub fn extract_text(bytes: &[u8]) -> ToolResult<Vec<PageText>> {
    let doc = load(bytes)?;
    Ok(doc
        .get_pages()
        .keys()
        .map(|&page| PageText {
            page,
            text: doc
                .extract_text(&[page])
                .map(|t| t.trim().to_string())
                .unwrap_or_default(),
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct PageSize {
    pub page: u32,
    pub width: f32,
    pub height: f32,
    pub rotation: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfInfo {
    pub page_count: usize,
    pub version: String,
    pub encrypted: bool,
    pub metadata: BTreeMap<String, String>,
    pub pages: Vec<PageSize>,
}

pub fn info(bytes: &[u8]) -> ToolResult<PdfInfo> {
    let encrypted = load_raw(bytes)?.is_encrypted();
    let doc = load(bytes)?;

    let metadata = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| resolve(&doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .map(|dict| {
            INFO_KEYS
                .iter()
                .filter_map(|key| {
                    let value = dict.get(key.as_bytes()).ok().and_then(|o| resolve(&doc, o))?;
                    let text = decode_text_string(value)?;
                    (!text.is_empty()).then(|| (key.to_string(), text))
                })
                .collect()
        })
        .unwrap_or_default();

    let pages = page_sizes(&doc);
    Ok(PdfInfo {
        page_count: pages.len(),
        version: doc.version.clone(),
        encrypted,
        metadata,
        pages,
    })
}

fn page_sizes(doc: &Document) -> Vec<PageSize> {
    doc.get_pages()
        .into_iter()
        .map(|(page, id)| {
            let [x0, y0, x1, y1] = media_box(doc, id);
            PageSize {
                page,
                width: x1 - x0,
                height: y1 - y0,
                rotation: page_rotation(doc, id),
            }
        })
        .collect()
}

/// PDF text string: UTF-16BE with a BOM, otherwise treated as Latin-1
pub(crate) fn decode_text_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    let text = if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    };
    Some(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{sample_pdf, sample_pdf_sized};
    use super::*;
    use lopdf::StringFormat;

    #[test]
    fn test_extract_text_per_page() {
        let pages = extract_text(&sample_pdf(2)).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page, 2);
        assert!(pages[1].text.contains("Page 2"));
    }

    #[test]
    fn test_info() {
        let info = info(&sample_pdf_sized(3, 595, 842)).unwrap();
        assert_eq!(info.page_count, 3);
        assert!(!info.encrypted);
        assert_eq!(info.metadata.get("Title").map(String::as_str), Some("Sample"));
        assert_eq!(info.pages[0].width, 595.0);
        assert_eq!(info.pages[0].height, 842.0);
        assert_eq!(info.pages[0].rotation, 0);
    }

    #[test]
    fn test_decode_text_string() {
        let utf16 = Object::String(vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0xE9], StringFormat::Hexadecimal);
        assert_eq!(decode_text_string(&utf16).as_deref(), Some("Hé"));
        let latin = Object::String(vec![b'C', b'a', b'f', 0xE9], StringFormat::Literal);
        assert_eq!(decode_text_string(&latin).as_deref(), Some("Café"));
        assert_eq!(decode_text_string(&Object::Integer(1)), None);
    }
}

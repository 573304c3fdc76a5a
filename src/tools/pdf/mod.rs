//! PDF tools on top of `lopdf`
//!
//! Every function takes and returns raw bytes; callers run them on the
//! blocking pool.

mod assemble;
mod edit;
mod images;
mod inspect;
pub mod pages;
mod stamp;
mod unlock;

pub use assemble::{extract_pages, merge, remove_pages, split, SplitPart};
pub use edit::{compress, rotate, CompressStats};
pub use images::images_to_pdf;
pub use inspect::{extract_text, info, PageText, PdfInfo};
pub use stamp::{add_page_numbers, watermark, NumberPosition, PageNumberOptions, WatermarkOptions};
pub use unlock::{unlock, UnlockMethod};

use crate::tools::error::{ToolError, ToolResult};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// US Letter, used when a page has no media box anywhere in its tree
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page attributes a page may inherit from its ancestors
const INHERITABLE: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Load a PDF for editing. Documents encrypted with an empty user password
/// are decrypted; anything else must go through `unlock` first.
pub fn load(bytes: &[u8]) -> ToolResult<Document> {
    let mut doc = load_raw(bytes)?;
    if doc.is_encrypted() && unlock::decrypt(&mut doc, "").is_err() {
        return Err(ToolError::invalid(
            "This PDF is password protected; unlock it first",
        ));
    }
    if doc.get_pages().is_empty() {
        return Err(ToolError::invalid("The PDF has no pages"));
    }
    Ok(doc)
}

/// Parse without touching encryption
pub(crate) fn load_raw(bytes: &[u8]) -> ToolResult<Document> {
    if !bytes.starts_with(b"%PDF") && !bytes.windows(4).take(1024).any(|w| w == b"%PDF") {
        return Err(ToolError::invalid("The file is not a PDF"));
    }
    Document::load_mem(bytes).map_err(|e| ToolError::invalid(format!("Could not read PDF: {}", e)))
}

pub fn save(doc: &mut Document) -> ToolResult<Vec<u8>> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ToolError::processing(format!("Failed to write PDF: {}", e)))?;
    Ok(out)
}

pub fn page_count(bytes: &[u8]) -> ToolResult<u32> {
    Ok(load(bytes)?.get_pages().len() as u32)
}

/// Look up an attribute on the page or the nearest ancestor that has it
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Bounded walk; malformed trees can loop
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Copy inherited attributes onto the page itself so it survives being
/// moved to a different page tree
pub(crate) fn flatten_inherited(doc: &Document, page_id: ObjectId, page: &mut Dictionary) {
    for key in INHERITABLE {
        if page.get(key).is_err() {
            if let Some(value) = inherited(doc, page_id, key) {
                page.set(key.to_vec(), value.clone());
            }
        }
    }
}

pub(crate) fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Resolve a reference, or return the object itself
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Media box `[llx, lly, urx, ury]`
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let values: Option<Vec<f32>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .map(|arr| arr.iter().filter_map(|o| resolve(doc, o).and_then(as_number)).collect());
    match values.as_deref() {
        Some([a, b, c, d]) => [a.min(*c), b.min(*d), a.max(*c), b.max(*d)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Effective `/Rotate`, normalised to 0, 90, 180 or 270
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .map(normalize_angle)
        .unwrap_or(0)
}

pub(crate) fn normalize_angle(angle: i64) -> i64 {
    angle.rem_euclid(360)
}

/// Type name of a dictionary or stream object
pub(crate) fn type_of(obj: &Object) -> Option<&[u8]> {
    let dict = match obj {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        _ => return None,
    };
    dict.get(b"Type").ok().and_then(|t| t.as_name().ok())
}

//! In-place edits: rotation and compression

use super::pages::parse_pages;
use super::{load, normalize_angle, page_rotation, save};
use crate::tools::error::{ToolError, ToolResult};
use crate::tools::raster::encode_jpeg;
use image::ImageFormat;
use lopdf::{Document, Object, ObjectId};
use serde::Serialize;

/// Add `angle` degrees to the rotation of the selected pages (all by default)
pub fn rotate(bytes: &[u8], angle: i64, selection: Option<&str>) -> ToolResult<Vec<u8>> {
    if angle % 90 != 0 {
        return Err(ToolError::invalid("Rotation must be a multiple of 90 degrees"));
    }
    let mut doc = load(bytes)?;
    let page_map = doc.get_pages();
    let pages = parse_pages(selection.unwrap_or(""), page_map.len() as u32)?;

    for n in pages {
        let Some(&page_id) = page_map.get(&n) else {
            continue;
        };
        let rotation = normalize_angle(page_rotation(&doc, page_id) + angle);
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| ToolError::processing(format!("Broken page {}: {}", n, e)))?
            .set("Rotate", rotation);
    }
    save(&mut doc)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompressStats {
    pub objects_removed: usize,
    pub images_recompressed: usize,
}

/// Prune unreachable objects, drop empty streams and deflate the rest.
/// With a `jpeg_quality`, embedded RGB/gray JPEGs are re-encoded and kept
/// only when smaller.
pub fn compress(bytes: &[u8], jpeg_quality: Option<u8>) -> ToolResult<(Vec<u8>, CompressStats)> {
    if let Some(q) = jpeg_quality {
        if !(1..=100).contains(&q) {
            return Err(ToolError::invalid("Quality must be between 1 and 100"));
        }
    }
    let mut doc = load(bytes)?;
    let mut stats = CompressStats {
        objects_removed: doc.prune_objects().len(),
        ..Default::default()
    };
    stats.objects_removed += doc.delete_zero_length_streams().len();

    if let Some(quality) = jpeg_quality {
        stats.images_recompressed = recompress_jpegs(&mut doc, quality);
    }

    doc.compress();
    let out = save(&mut doc)?;
    tracing::debug!(
        removed = stats.objects_removed,
        images = stats.images_recompressed,
        "PDF compressed"
    );
    Ok((out, stats))
}

fn recompress_jpegs(doc: &mut Document, quality: u8) -> usize {
    let candidates: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter_map(|(id, obj)| match obj {
            Object::Stream(s) if is_plain_jpeg(&s.dict) => Some(*id),
            _ => None,
        })
        .collect();

    let mut replaced = 0;
    for id in candidates {
        let Ok(Object::Stream(stream)) = doc.get_object_mut(id) else {
            continue;
        };
        let Ok(img) = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg) else {
            continue;
        };
        match encode_jpeg(&img, quality) {
            Ok(smaller) if smaller.len() < stream.content.len() => {
                stream.set_content(smaller);
                replaced += 1;
            }
            _ => {}
        }
    }
    replaced
}

/// A DCT image we can safely re-encode: single filter, RGB or gray, no decode array
fn is_plain_jpeg(dict: &lopdf::Dictionary) -> bool {
    let name = |key: &[u8]| dict.get(key).ok().and_then(|o| o.as_name().ok());
    name(b"Subtype") == Some(b"Image".as_slice())
        && name(b"Filter") == Some(b"DCTDecode".as_slice())
        && matches!(name(b"ColorSpace"), Some(b"DeviceRGB") | Some(b"DeviceGray"))
        && dict.get(b"Decode").is_err()
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{page_texts, sample_pdf};
    use super::*;
    use lopdf::dictionary;

    fn rotation_of(bytes: &[u8], page: u32) -> i64 {
        let doc = Document::load_mem(bytes).unwrap();
        page_rotation(&doc, doc.get_pages()[&page])
    }

    #[test]
    fn test_rotate_adds_to_existing() {
        let once = rotate(&sample_pdf(2), 90, None).unwrap();
        assert_eq!(rotation_of(&once, 1), 90);
        let twice = rotate(&once, 270, Some("2")).unwrap();
        assert_eq!(rotation_of(&twice, 1), 90);
        assert_eq!(rotation_of(&twice, 2), 0);
        let back = rotate(&once, -180, Some("1")).unwrap();
        assert_eq!(rotation_of(&back, 1), 270);
    }

    #[test]
    fn test_rotate_rejects_odd_angles() {
        assert!(matches!(rotate(&sample_pdf(1), 45, None), Err(ToolError::InvalidInput(_))));
    }

    #[test]
    fn test_compress_keeps_content() {
        let input = sample_pdf(3);
        let (out, _) = compress(&input, None).unwrap();
        assert_eq!(page_texts(&out), vec!["Page 1", "Page 2", "Page 3"]);
        assert!(compress(&input, Some(0)).is_err());
    }

    #[test]
    fn test_jpeg_detection() {
        let jpeg = dictionary! {
            "Subtype" => "Image",
            "Filter" => "DCTDecode",
            "ColorSpace" => "DeviceRGB",
        };
        assert!(is_plain_jpeg(&jpeg));
        let mut cmyk = jpeg.clone();
        cmyk.set("ColorSpace", "DeviceCMYK");
        assert!(!is_plain_jpeg(&cmyk));
    }
}

//! Images to PDF: one page per image, sized to the image at 72 dpi

use super::save;
use crate::tools::error::{ToolError, ToolResult};
use crate::tools::raster::encode_jpeg;
use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

const JPEG_QUALITY: u8 = 92;

pub fn images_to_pdf(images: &[Vec<u8>]) -> ToolResult<Vec<u8>> {
    if images.is_empty() {
        return Err(ToolError::invalid("At least one image is required"));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(images.len());

    for (i, bytes) in images.iter().enumerate() {
        let (jpeg, width, height, gray) = as_jpeg(bytes)
            .map_err(|e| ToolError::invalid(format!("Image {}: {}", i + 1, e)))?;

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => if gray { "DeviceGray" } else { "DeviceRGB" },
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (width as i64).into(),
                        0.into(),
                        0.into(),
                        (height as i64).into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| ToolError::processing(format!("Failed to encode page: {}", e)))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    save(&mut doc)
}

/// JPEG bytes for embedding. Baseline RGB/gray JPEGs pass through untouched;
/// everything else is decoded, flattened onto white and re-encoded.
fn as_jpeg(bytes: &[u8]) -> ToolResult<(Vec<u8>, u32, u32, bool)> {
    let format = image::guess_format(bytes)
        .map_err(|_| ToolError::UnsupportedFormat("unrecognised image data".to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ToolError::invalid("Image has no pixels"));
    }

    if format == ImageFormat::Jpeg {
        match &img {
            DynamicImage::ImageRgb8(_) => return Ok((bytes.to_vec(), width, height, false)),
            DynamicImage::ImageLuma8(_) => return Ok((bytes.to_vec(), width, height, true)),
            _ => {}
        }
    }

    let gray = matches!(img, DynamicImage::ImageLuma8(_));
    Ok((encode_jpeg(&img, JPEG_QUALITY)?, width, height, gray))
}

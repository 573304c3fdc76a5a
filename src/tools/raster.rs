//! Raster image tools on top of the `image` crate

use super::error::{ToolError, ToolResult};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use serde::Deserialize;
use std::io::Cursor;

pub const DEFAULT_QUALITY: u8 = 75;

/// Largest accepted output dimension for resizing
pub const MAX_DIMENSION: u32 = 10_000;

/// Encoded image plus what the response needs to describe it
#[derive(Debug, Clone)]
pub struct RasterOutput {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl RasterOutput {
    pub fn mime(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// A decoded input and the format it arrived in
pub struct Decoded {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

pub fn decode(bytes: &[u8]) -> ToolResult<Decoded> {
    let format = image::guess_format(bytes)
        .map_err(|_| ToolError::UnsupportedFormat("unrecognised image data".to_string()))?;
    let image = image::load_from_memory_with_format(bytes, format)?;
    Ok(Decoded { image, format })
}

/// Parse a user-facing format name
pub fn parse_format(name: &str) -> ToolResult<ImageFormat> {
    match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "webp" => Ok(ImageFormat::WebP),
        "gif" => Ok(ImageFormat::Gif),
        "bmp" => Ok(ImageFormat::Bmp),
        "tif" | "tiff" => Ok(ImageFormat::Tiff),
        other => Err(ToolError::UnsupportedFormat(format!(
            "'{}'; use png, jpeg, webp, gif, bmp or tiff",
            other
        ))),
    }
}

/// Formats we can write; anything else is written as PNG
fn output_format(format: ImageFormat) -> ImageFormat {
    match format {
        ImageFormat::Png
        | ImageFormat::Jpeg
        | ImageFormat::WebP
        | ImageFormat::Gif
        | ImageFormat::Bmp
        | ImageFormat::Tiff => format,
        _ => ImageFormat::Png,
    }
}

pub fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> ToolResult<RasterOutput> {
    let format = output_format(format);
    let mut bytes = Vec::new();
    match format {
        ImageFormat::Jpeg => bytes = encode_jpeg(img, quality)?,
        ImageFormat::Png => {
            let encoder = PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, PngFilter::Adaptive);
            img.write_with_encoder(encoder)?;
        }
        ImageFormat::Bmp => {
            DynamicImage::ImageRgb8(flatten_alpha(img)).write_to(&mut Cursor::new(&mut bytes), format)?
        }
        // WebP output is lossless
        _ => DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut Cursor::new(&mut bytes), format)?,
    }
    let (width, height) = img.dimensions();
    Ok(RasterOutput {
        bytes,
        format,
        width,
        height,
    })
}

/// JPEG at `quality`; transparency is flattened onto white
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> ToolResult<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    match img {
        DynamicImage::ImageLuma8(_) => img.write_with_encoder(encoder)?,
        _ if img.color().has_alpha() => DynamicImage::ImageRgb8(flatten_alpha(img)).write_with_encoder(encoder)?,
        _ => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?,
    }
    Ok(out)
}

/// Composite onto a white background
pub fn flatten_alpha(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y).0;
        let alpha = p[3] as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

/// An alpha channel with at least one pixel below full opacity
pub fn has_transparency(img: &DynamicImage) -> bool {
    img.color().has_alpha() && img.pixels().any(|(_, _, p)| p.0[3] < u8::MAX)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    pub quality: Option<u8>,
    /// Output format; defaults to JPEG, or PNG for images with transparency
    pub format: Option<String>,
}

pub fn compress(bytes: &[u8], opts: &CompressOptions) -> ToolResult<RasterOutput> {
    let quality = opts.quality.unwrap_or(DEFAULT_QUALITY);
    if !(1..=100).contains(&quality) {
        return Err(ToolError::invalid("Quality must be between 1 and 100"));
    }
    let input = decode(bytes)?;
    let format = match opts.format.as_deref() {
        Some(name) => parse_format(name)?,
        None if has_transparency(&input.image) => ImageFormat::Png,
        None => ImageFormat::Jpeg,
    };
    encode(&input.image, format, quality)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResizeOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub keep_aspect: bool,
    pub format: Option<String>,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            keep_aspect: true,
            format: None,
        }
    }
}

pub fn resize(bytes: &[u8], opts: &ResizeOptions) -> ToolResult<RasterOutput> {
    let input = decode(bytes)?;
    let (w, h) = input.image.dimensions();
    let (tw, th) = target_size((w, h), opts.width, opts.height, opts.keep_aspect)?;
    let resized = if opts.keep_aspect {
        input.image.resize(tw, th, FilterType::Lanczos3)
    } else {
        input.image.resize_exact(tw, th, FilterType::Lanczos3)
    };
    encode(&resized, format_or(&opts.format, input.format)?, DEFAULT_QUALITY)
}

/// Target box for a resize; a missing side follows the aspect ratio
pub(crate) fn target_size(
    (w, h): (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    keep_aspect: bool,
) -> ToolResult<(u32, u32)> {
    let scale = |num: u32, den: u32, side: u32| ((side as u64 * num as u64) / den.max(1) as u64).max(1) as u32;
    let size = match (width, height) {
        (None, None) => return Err(ToolError::invalid("Give a width, a height or both")),
        (Some(tw), Some(th)) => (tw, th),
        (Some(tw), None) if keep_aspect => (tw, scale(tw, w, h)),
        (None, Some(th)) if keep_aspect => (scale(th, h, w), th),
        (Some(tw), None) => (tw, h),
        (None, Some(th)) => (w, th),
    };
    if size.0 == 0 || size.1 == 0 || size.0 > MAX_DIMENSION || size.1 > MAX_DIMENSION {
        return Err(ToolError::invalid(format!(
            "Dimensions must be between 1 and {} pixels",
            MAX_DIMENSION
        )));
    }
    Ok(size)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub format: String,
    pub quality: Option<u8>,
}

pub fn convert(bytes: &[u8], opts: &ConvertOptions) -> ToolResult<RasterOutput> {
    if opts.format.trim().is_empty() {
        return Err(ToolError::invalid("Target format is required"));
    }
    let format = parse_format(&opts.format)?;
    let input = decode(bytes)?;
    encode(&input.image, format, opts.quality.unwrap_or(90))
}

pub fn rotate(bytes: &[u8], angle: i64, format: &Option<String>) -> ToolResult<RasterOutput> {
    let input = decode(bytes)?;
    let rotated = match angle.rem_euclid(360) {
        0 => input.image,
        90 => input.image.rotate90(),
        180 => input.image.rotate180(),
        270 => input.image.rotate270(),
        _ => return Err(ToolError::invalid("Rotation must be 90, 180 or 270 degrees")),
    };
    encode(&rotated, format_or(format, input.format)?, DEFAULT_QUALITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipDirection {
    #[default]
    Horizontal,
    Vertical,
}

pub fn flip(bytes: &[u8], direction: FlipDirection, format: &Option<String>) -> ToolResult<RasterOutput> {
    let input = decode(bytes)?;
    let flipped = match direction {
        FlipDirection::Horizontal => input.image.fliph(),
        FlipDirection::Vertical => input.image.flipv(),
    };
    encode(&flipped, format_or(format, input.format)?, DEFAULT_QUALITY)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CropOptions {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

pub fn crop(bytes: &[u8], opts: &CropOptions) -> ToolResult<RasterOutput> {
    let input = decode(bytes)?;
    let (w, h) = input.image.dimensions();
    if opts.width == 0 || opts.height == 0 {
        return Err(ToolError::invalid("Crop width and height must be positive"));
    }
    let fits = |offset: u32, size: u32, limit: u32| offset.checked_add(size).is_some_and(|end| end <= limit);
    if !fits(opts.x, opts.width, w) || !fits(opts.y, opts.height, h) {
        return Err(ToolError::invalid(format!(
            "Crop area lies outside the {}x{} image",
            w, h
        )));
    }
    let cropped = input.image.crop_imm(opts.x, opts.y, opts.width, opts.height);
    encode(&cropped, format_or(&opts.format, input.format)?, DEFAULT_QUALITY)
}

pub fn grayscale(bytes: &[u8], format: &Option<String>) -> ToolResult<RasterOutput> {
    let input = decode(bytes)?;
    let gray = if input.image.color().has_alpha() {
        DynamicImage::ImageLumaA8(input.image.to_luma_alpha8())
    } else {
        DynamicImage::ImageLuma8(input.image.to_luma8())
    };
    encode(&gray, format_or(format, input.format)?, DEFAULT_QUALITY)
}

fn format_or(requested: &Option<String>, input: ImageFormat) -> ToolResult<ImageFormat> {
    match requested.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => parse_format(name),
        None => Ok(input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| Rgba([(x * 7) as u8, (y * 5) as u8, 90, 255]));
        let img = DynamicImage::ImageRgba8(img);
        let img = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(img.to_rgb8())
        } else {
            img
        };
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    fn dims(out: &RasterOutput) -> (u32, u32) {
        image::load_from_memory(&out.bytes).unwrap().dimensions()
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("JPG").unwrap(), ImageFormat::Jpeg);
        assert_eq!(parse_format(".tif").unwrap(), ImageFormat::Tiff);
        assert!(matches!(parse_format("heic"), Err(ToolError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_target_size() {
        assert_eq!(target_size((400, 200), Some(100), None, true).unwrap(), (100, 50));
        assert_eq!(target_size((400, 200), None, Some(50), true).unwrap(), (100, 50));
        assert_eq!(target_size((400, 200), Some(100), None, false).unwrap(), (100, 200));
        assert!(target_size((400, 200), None, None, true).is_err());
        assert!(target_size((400, 200), Some(0), None, true).is_err());
        assert!(target_size((400, 200), Some(MAX_DIMENSION + 1), None, true).is_err());
    }

    #[test]
    fn test_resize_keeps_format() {
        let out = resize(
            &sample(40, 20, ImageFormat::Png),
            &ResizeOptions {
                width: Some(20),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(out.format, ImageFormat::Png);
        assert_eq!(out.mime(), "image/png");
        assert_eq!(dims(&out), (20, 10));
    }

    #[test]
    fn test_compress_to_jpeg() {
        let out = compress(&sample(32, 32, ImageFormat::Bmp), &CompressOptions::default()).unwrap();
        assert_eq!(out.format, ImageFormat::Jpeg);
        assert_eq!(out.extension(), "jpg");
        let bad = CompressOptions {
            quality: Some(0),
            ..Default::default()
        };
        assert!(compress(&sample(4, 4, ImageFormat::Png), &bad).is_err());
    }

    #[test]
    fn test_compress_keeps_png_only_for_real_transparency() {
        // Opaque RGBA still goes lossy
        let opaque = compress(&sample(16, 16, ImageFormat::Png), &CompressOptions::default()).unwrap();
        assert_eq!(opaque.format, ImageFormat::Jpeg);

        let mut img = RgbaImage::from_pixel(16, 16, Rgba([10, 20, 30, 255]));
        img.put_pixel(3, 3, Rgba([0, 0, 0, 0]));
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let out = compress(&png, &CompressOptions::default()).unwrap();
        assert_eq!(out.format, ImageFormat::Png);
    }

    #[test]
    fn test_convert_formats() {
        let png = sample(8, 8, ImageFormat::Png);
        for name in ["jpeg", "webp", "gif", "bmp", "tiff"] {
            let out = convert(&png, &ConvertOptions { format: name.into(), quality: None }).unwrap();
            assert_eq!(image::guess_format(&out.bytes).unwrap(), parse_format(name).unwrap());
        }
    }

    #[test]
    fn test_rotate_and_flip() {
        let png = sample(30, 10, ImageFormat::Png);
        assert_eq!(dims(&rotate(&png, 90, &None).unwrap()), (10, 30));
        assert_eq!(dims(&rotate(&png, -180, &None).unwrap()), (30, 10));
        assert!(rotate(&png, 45, &None).is_err());
        assert_eq!(dims(&flip(&png, FlipDirection::Vertical, &None).unwrap()), (30, 10));
    }

    #[test]
    fn test_crop_bounds() {
        let png = sample(30, 20, ImageFormat::Png);
        let ok = crop(
            &png,
            &CropOptions {
                x: 10,
                y: 5,
                width: 20,
                height: 15,
                format: None,
            },
        )
        .unwrap();
        assert_eq!(dims(&ok), (20, 15));
        let outside = CropOptions {
            x: 20,
            y: 0,
            width: 20,
            height: 5,
            format: None,
        };
        assert!(matches!(crop(&png, &outside), Err(ToolError::InvalidInput(_))));
    }

    #[test]
    fn test_grayscale() {
        let out = grayscale(&sample(6, 6, ImageFormat::Png), &None).unwrap();
        let img = image::load_from_memory(&out.bytes).unwrap();
        let px = img.to_rgba8().get_pixel(3, 3).0;
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"definitely not"), Err(ToolError::UnsupportedFormat(_))));
    }
}

//! Client-side thumbnails for scan previews.
//!
//! Aspect ratio is always preserved and images are never upscaled. EXIF
//! orientation is applied first so phone photos of films come out upright.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_WIDTH: u32 = 200;
pub const DEFAULT_MAX_HEIGHT: u32 = 200;
/// JPEG quality factor (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

pub const THUMBNAIL_MIME_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to load image for thumbnail generation: {0}")]
    Decode(String),

    #[error("Thumbnail encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailOptions {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Encoded JPEG thumbnail and its pixel dimensions.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Compute dimensions that fit inside `max_width` x `max_height` while
/// preserving aspect ratio.
///
/// The binding constraint is whichever side needs the larger reduction;
/// the other side follows proportionally. Small images are NOT upscaled.
pub fn thumbnail_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);

    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);

    let new_w = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let new_h = ((height as f64 * scale).round() as u32).clamp(1, max_height);

    (new_w, new_h)
}

/// Decode `bytes`, downscale, and re-encode as JPEG.
pub fn generate_thumbnail(bytes: &[u8], options: &ThumbnailOptions) -> Result<Thumbnail, ThumbnailError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| ThumbnailError::Decode(e.to_string()))?;
    let image = apply_orientation(decoded, read_exif_orientation(bytes));

    let (width, height) = image.dimensions();
    let (new_w, new_h) = thumbnail_dimensions(width, height, options.max_width, options.max_height);

    debug!(width, height, new_w, new_h, "Generating thumbnail");

    let resized = if (new_w, new_h) == (width, height) {
        image.to_rgb8()
    } else {
        image::imageops::resize(&image.to_rgb8(), new_w, new_h, FilterType::Triangle)
    };

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(resized)
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(options.quality.clamp(1, 100)))
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;

    Ok(Thumbnail {
        bytes: cursor.into_inner(),
        width: new_w,
        height: new_h,
    })
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply EXIF orientation transform to a `DynamicImage`.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

//! Image downscaling before upload.
//!
//! Phone scans of journal pages are routinely 4032 × 3024 px. Vision APIs
//! tile large images and bill per tile, so shrinking the longest side to a
//! fixed cap keeps per-page cost flat without losing handwriting legibility.
//!
//! Images already within the cap are passed through untouched (same bytes,
//! no re-encode). Larger images are resampled with Catmull-Rom and
//! re-encoded in their own format, except WebP: `image` only ships a
//! lossless WebP encoder, so resized WebP pages are re-encoded as JPEG.

use crate::error::ImageError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// JPEG quality used for every lossy re-encode.
pub const JPEG_QUALITY: u8 = 92;

/// Codecs tried, in order, when decoding an image.
pub const DECODE_ORDER: [ImageFormat; 5] = [
    ImageFormat::WebP,
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

/// Shrink `bytes` so that its longest side is at most `max_longest_side`.
///
/// Returns `bytes` itself when no resize is needed.
///
/// # Errors
/// * [`ImageError::InvalidDimension`] if `max_longest_side <= 0`
/// * [`ImageError::DecodeFailure`] if no supported codec can decode `bytes`
/// * [`ImageError::EncodeFailure`] if the resized image cannot be re-encoded
pub fn resize_image(bytes: Vec<u8>, max_longest_side: i64) -> Result<Vec<u8>, ImageError> {
    if max_longest_side <= 0 {
        return Err(ImageError::InvalidDimension {
            max: max_longest_side,
        });
    }
    let max = u32::try_from(max_longest_side).unwrap_or(u32::MAX);

    let (img, format) = decode(&bytes)?;
    let (width, height) = img.dimensions();

    if width.max(height) <= max {
        return Ok(bytes);
    }

    let (new_width, new_height) = target_dimensions(width, height, max);
    debug!(
        "Resizing {:?} {}x{} → {}x{}",
        format, width, height, new_width, new_height
    );
    let resized = img.resize_exact(new_width, new_height, FilterType::CatmullRom);
    encode(&resized, format)
}

/// Dimensions after scaling the longest side down to `max`.
///
/// The longest side becomes exactly `max`; the other side is
/// `other * max / longest` in integer arithmetic (any fractional pixel is
/// dropped), never below 1 px.
///
/// ```rust
/// use edgequake_img2txt::pipeline::resize::target_dimensions;
///
/// assert_eq!(target_dimensions(1000, 2000, 1500), (750, 1500));
/// assert_eq!(target_dimensions(4032, 2707, 1500), (1500, 1007));
/// assert_eq!(target_dimensions(800, 600, 1500), (800, 600));
/// ```
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max {
        return (width, height);
    }
    let scale = |other: u32| {
        let scaled = u64::from(other) * u64::from(max) / u64::from(longest);
        (scaled as u32).max(1)
    };
    if width >= height {
        (max, scale(height))
    } else {
        (scale(width), max)
    }
}

/// Decode with each supported codec in turn; the first success wins.
fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), ImageError> {
    let mut last_err = None;
    for format in DECODE_ORDER {
        match image::load_from_memory_with_format(bytes, format) {
            Ok(img) => return Ok((img, format)),
            Err(e) => last_err = Some(e),
        }
    }
    Err(ImageError::DecodeFailure {
        detail: match last_err {
            Some(e) => format!("unsupported image format or invalid image data ({e})"),
            None => "unsupported image format or invalid image data".to_string(),
        },
    })
}

/// Re-encode in the detected format (WebP → JPEG).
fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    let label = match format {
        ImageFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut buf,
                CompressionType::Best,
                PngFilterType::Adaptive,
            );
            img.write_with_encoder(encoder).map(|_| "PNG")
        }
        ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif)
            .map(|_| "GIF"),
        ImageFormat::Bmp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Bmp)
            .map(|_| "BMP"),
        _ => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map(|_| "JPEG")
        }
    }
    .map_err(|e| ImageError::EncodeFailure {
        format: format!("{format:?}"),
        detail: e.to_string(),
    })?;

    debug!("Re-encoded {:?} as {} ({} bytes)", format, label, buf.len());
    Ok(buf)
}

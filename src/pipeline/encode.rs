//! Image encoding: raw image bytes → base64 `data:` URL for the VLM request.
//!
//! OpenAI-compatible vision APIs accept images as data URLs embedded in the
//! JSON body. The MIME type is sniffed from the bytes so a PNG page is not
//! labelled `image/jpeg`; unknown bytes fall back to `image/jpeg`, which is
//! what most scanners produce.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use tracing::debug;

/// MIME type for the given image bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Wrap image bytes as `data:<mime>;base64,<payload>`.
pub fn to_data_url(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    format!("data:{};base64,{}", sniff_mime(bytes), b64)
}

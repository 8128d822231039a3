//! Image encoding: `DynamicImage` → PNG bytes → base64.
//!
//! The Ollama API accepts images as bare base64 strings in the JSON request
//! body; Markdown embeds them as `data:` URIs. PNG is used for every exported
//! region because it is lossless, and text crispness matters more than file
//! size for OCR accuracy.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} PNG bytes", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Base64-encode raw file bytes for an inference request.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Build a `data:` URI from PNG bytes.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", to_base64(png))
}

/// Decode a base64 `data:` URI into its raw bytes. Returns `None` for
/// anything that is not a base64 data URI.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(payload.trim()).ok()
}

/// Make sure `bytes` are PNG: PNG input is passed through untouched, any
/// other decodable image is re-encoded.
pub fn ensure_png(bytes: Vec<u8>) -> Result<Vec<u8>, image::ImageError> {
    if bytes.starts_with(b"\x89PNG") {
        return Ok(bytes);
    }
    let img = image::load_from_memory(&bytes)?;
    encode_png(&img)
}

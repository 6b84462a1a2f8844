//! Photo import.
//!
//! Photos are stored inline as `data:image/<type>;base64,<payload>` strings,
//! so a record stays self-contained in either backend.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::error::{Error, Result};

/// Image types accepted for photos.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
];

/// Read an image file and encode it as a data URL.
///
/// The image type comes from the file contents when recognisable and from
/// the extension otherwise.
///
/// # Errors
///
/// Returns [`Error::PhotoLoad`] if the file is missing, larger than
/// `max_bytes`, or not a recognised image type.
pub fn load_data_url(path: impl AsRef<Path>, max_bytes: u64) -> Result<String> {
    let path = path.as_ref();

    let size = std::fs::metadata(path)
        .map_err(|e| Error::photo_load(path, e.to_string()))?
        .len();
    if size > max_bytes {
        return Err(Error::photo_load(
            path,
            format!("file is {size} bytes, limit is {max_bytes}"),
        ));
    }

    let bytes = std::fs::read(path).map_err(|e| Error::photo_load(path, e.to_string()))?;
    let mime = sniff_mime(&bytes)
        .or_else(|| mime_for_extension(path))
        .ok_or_else(|| Error::photo_load(path, "not a recognised image type"))?;

    debug!("Loaded {} byte {} photo from {}", bytes.len(), mime, path.display());
    Ok(encode_data_url(mime, &bytes))
}

/// Encode raw image bytes as a data URL.
#[must_use]
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Media type of a data URL, if it is one.
#[must_use]
pub fn data_url_mime(data_url: &str) -> Option<&str> {
    let rest = data_url.strip_prefix("data:")?;
    let end = rest.find([';', ','])?;
    Some(&rest[..end])
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

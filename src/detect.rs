//! Content type detection
//!
//! Files are identified by their bytes, never by their extension. Image
//! signatures come from the `image` crate; anything else is checked for JSON
//! and then for UTF-8 text.

use image::ImageFormat;
use std::io;
use std::path::Path;

/// Content types compacty understands, with their canonical extension
const KNOWN_TYPES: &[(&str, &str)] = &[
    ("image/png", ".png"),
    ("image/vnd.mozilla.apng", ".apng"),
    ("image/jpeg", ".jpg"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("image/bmp", ".bmp"),
    ("image/tiff", ".tiff"),
    ("image/x-icon", ".ico"),
    ("image/avif", ".avif"),
    ("application/json", ".json"),
    ("text/plain", ".txt"),
];

pub const APNG: &str = "image/vnd.mozilla.apng";

pub fn is_known(mime: &str) -> bool {
    KNOWN_TYPES.iter().any(|(known, _)| *known == mime)
}

pub fn canonical_extension(mime: &str) -> Option<&'static str> {
    KNOWN_TYPES
        .iter()
        .find(|(known, _)| *known == mime)
        .map(|(_, extension)| *extension)
}

/// Detects the content type of a file on disk
pub trait ContentSniffer: Sync {
    fn detect(&self, path: &Path) -> io::Result<Option<&'static str>>;
}

/// Sniffer reading the file and matching magic bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicSniffer;

impl ContentSniffer for MagicSniffer {
    fn detect(&self, path: &Path) -> io::Result<Option<&'static str>> {
        let data = std::fs::read(path)?;
        Ok(detect_bytes(&data))
    }
}

pub fn detect_bytes(data: &[u8]) -> Option<&'static str> {
    if let Ok(format) = image::guess_format(data) {
        return match format {
            ImageFormat::Png if is_animated_png(data) => Some(APNG),
            ImageFormat::Png => Some("image/png"),
            ImageFormat::Jpeg => Some("image/jpeg"),
            ImageFormat::Gif => Some("image/gif"),
            ImageFormat::WebP => Some("image/webp"),
            ImageFormat::Bmp => Some("image/bmp"),
            ImageFormat::Tiff => Some("image/tiff"),
            ImageFormat::Ico => Some("image/x-icon"),
            ImageFormat::Avif => Some("image/avif"),
            _ => None,
        };
    }

    if serde_json::from_slice::<serde_json::Value>(data).is_ok() {
        return Some("application/json");
    }

    if std::str::from_utf8(data).is_ok() {
        return Some("text/plain");
    }

    None
}

/// An APNG carries an `acTL` chunk before its first `IDAT`
fn is_animated_png(data: &[u8]) -> bool {
    const SIGNATURE_LEN: usize = 8;
    let mut offset = SIGNATURE_LEN;

    while offset + 8 <= data.len() {
        let length = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        let kind = &data[offset + 4..offset + 8];

        match kind {
            b"acTL" => return true,
            b"IDAT" | b"IEND" => return false,
            _ => {}
        }

        // length + type + data + crc
        offset = match offset.checked_add(12 + length) {
            Some(next) => next,
            None => return false,
        };
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out
    }

    #[test]
    fn test_png_and_apng() {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend(chunk(b"IHDR", &[0; 13]));
        png.extend(chunk(b"IDAT", &[0; 4]));
        assert_eq!(detect_bytes(&png), Some("image/png"));

        let mut apng = PNG_SIGNATURE.to_vec();
        apng.extend(chunk(b"IHDR", &[0; 13]));
        apng.extend(chunk(b"acTL", &[0; 8]));
        apng.extend(chunk(b"IDAT", &[0; 4]));
        assert_eq!(detect_bytes(&apng), Some(APNG));
    }

    #[test]
    fn test_jpeg_and_gif_signatures() {
        assert_eq!(detect_bytes(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), Some("image/jpeg"));
        assert_eq!(detect_bytes(b"GIF89a\x01\x00\x01\x00"), Some("image/gif"));
    }

    #[test]
    fn test_text_and_json() {
        assert_eq!(detect_bytes(br#"{"a": 1}"#), Some("application/json"));
        assert_eq!(detect_bytes(b"hello world"), Some("text/plain"));
        assert_eq!(detect_bytes(&[0xC3, 0x28, 0xA0, 0xA1]), None);
    }

    #[test]
    fn test_known_types() {
        assert!(is_known("image/png"));
        assert!(is_known(APNG));
        assert!(!is_known("image/apng"));
        assert_eq!(canonical_extension("image/jpeg"), Some(".jpg"));
        assert_eq!(canonical_extension("video/mp4"), None);
    }

    #[test]
    fn test_sniffer_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.png");
        std::fs::write(&path, "just text").unwrap();
        assert_eq!(MagicSniffer.detect(&path).unwrap(), Some("text/plain"));
        assert!(MagicSniffer.detect(&dir.path().join("missing")).is_err());
    }
}

//! Screenshot capture for vision-enabled decision steps.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, RgbImage};
use std::io::Cursor;

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Represents a captured screenshot.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub base64_data: String,
    pub width: u32,
    pub height: u32,
    /// True when the device refused capture (payment pages, secure flags).
    pub is_sensitive: bool,
}

impl Screenshot {
    /// Create a new screenshot.
    pub fn new(base64_data: String, width: u32, height: u32, is_sensitive: bool) -> Self {
        Self {
            base64_data,
            width,
            height,
            is_sensitive,
        }
    }

    /// Create a fallback black screenshot.
    pub fn fallback(is_sensitive: bool) -> Self {
        create_fallback_screenshot(is_sensitive)
    }
}

/// Turn `adb exec-out screencap -p` output into a [`Screenshot`].
///
/// Secure screens make screencap report `Status: -1` on stderr; those get a
/// black fallback flagged as sensitive. Any other malformed output gets a
/// plain fallback.
pub fn decode_screencap(png_data: &[u8], stderr: &str) -> Screenshot {
    if stderr.contains("Status: -1") || stderr.contains("Failed") || stderr.contains("error") {
        tracing::warn!("Screenshot may have failed (sensitive screen): {}", stderr.trim());
        return create_fallback_screenshot(true);
    }

    if png_data.len() < PNG_MAGIC.len() || &png_data[..PNG_MAGIC.len()] != PNG_MAGIC {
        tracing::error!("Invalid screenshot data ({} bytes)", png_data.len());
        return create_fallback_screenshot(false);
    }

    match image::load_from_memory(png_data) {
        Ok(img) => Screenshot::new(STANDARD.encode(png_data), img.width(), img.height(), false),
        Err(e) => {
            tracing::error!("Failed to parse screenshot image: {}", e);
            create_fallback_screenshot(false)
        }
    }
}

fn create_fallback_screenshot(is_sensitive: bool) -> Screenshot {
    let default_width: u32 = 1080;
    let default_height: u32 = 2400;

    let black_img = RgbImage::new(default_width, default_height);
    let dynamic_img = DynamicImage::ImageRgb8(black_img);

    let mut buffer = Cursor::new(Vec::new());
    if let Err(e) = dynamic_img.write_to(&mut buffer, image::ImageFormat::Png) {
        tracing::error!("Failed to encode fallback screenshot: {}", e);
    }
    let base64_data = STANDARD.encode(buffer.into_inner());

    Screenshot::new(base64_data, default_width, default_height, is_sensitive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_screenshot() {
        let screenshot = create_fallback_screenshot(true);
        assert_eq!(screenshot.width, 1080);
        assert_eq!(screenshot.height, 2400);
        assert!(screenshot.is_sensitive);
        assert!(!screenshot.base64_data.is_empty());
    }

    #[test]
    fn test_decode_secure_screen() {
        let shot = decode_screencap(&[], "Status: -1");
        assert!(shot.is_sensitive);
    }

    #[test]
    fn test_decode_valid_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 8));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();

        let shot = decode_screencap(&buffer.into_inner(), "");
        assert_eq!((shot.width, shot.height), (4, 8));
        assert!(!shot.is_sensitive);
    }

    #[test]
    fn test_decode_garbage() {
        let shot = decode_screencap(b"not a png at all", "");
        assert_eq!(shot.width, 1080);
        assert!(!shot.is_sensitive);
    }
}

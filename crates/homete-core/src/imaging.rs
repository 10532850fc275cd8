//! Image preprocessing before upload: format detection, size-bounded compression and base64
//! inline encoding.

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Upper bound on the bytes sent for one image (1 MiB)
pub const MAX_IMAGE_BYTES: usize = 1024 * 1024;

const MAX_ITERATIONS: usize = 10;
const INITIAL_JPEG_QUALITY: u8 = 90;
const MIN_JPEG_QUALITY: u8 = 50;

const SUPPORTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

/// Image data ready to be embedded in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Standard base64 of the (possibly compressed) file bytes
    pub data: String,
}

/// MIME type implied by a file's extension, if it is a supported image format
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path)
        .ok()
        .filter(|format| SUPPORTED_FORMATS.contains(format))
        .map(|format| format.to_mime_type())
}

fn detect_format(path: &Path, bytes: &[u8]) -> Result<ImageFormat> {
    let format = match ImageFormat::from_path(path) {
        Ok(format) => format,
        Err(_) => image::guess_format(bytes)
            .with_context(|| format!("Unrecognized image file {}", path.display()))?,
    };

    if !SUPPORTED_FORMATS.contains(&format) {
        bail!("Unsupported image format {:?} for {}", format, path.display());
    }
    Ok(format)
}

/// Read an image file, shrink it to `MAX_IMAGE_BYTES` and encode it for upload.
///
/// The MIME tag is the original file's type; compression re-encodes in that same format.
pub fn load_inline_image(path: &Path) -> Result<InlineImage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let format = detect_format(path, &bytes)?;
    let compressed = compress_to_limit(bytes, format, MAX_IMAGE_BYTES)?;

    Ok(InlineImage {
        mime_type: format.to_mime_type().to_string(),
        data: BASE64.encode(&compressed),
    })
}

/// Shrink encoded image bytes until they fit in `limit`.
///
/// Bytes already within the limit are returned untouched. Otherwise the image is re-encoded,
/// stepping JPEG quality down and scaling dimensions by `sqrt(limit / size)` per round.
pub fn compress_to_limit(bytes: Vec<u8>, format: ImageFormat, limit: usize) -> Result<Vec<u8>> {
    if bytes.len() <= limit {
        return Ok(bytes);
    }

    let original_len = bytes.len();
    let mut img = image::load_from_memory_with_format(&bytes, format)
        .context("Failed to decode image")?;
    let mut quality = INITIAL_JPEG_QUALITY;

    for iteration in 0..MAX_ITERATIONS {
        let encoded = encode(&img, format, quality)?;
        debug!(
            iteration,
            width = img.width(),
            height = img.height(),
            quality,
            size = encoded.len(),
            "compression pass"
        );

        if encoded.len() <= limit {
            debug!(original_len, compressed_len = encoded.len(), "image compressed");
            return Ok(encoded);
        }

        let scale = (limit as f64 / encoded.len() as f64).sqrt().clamp(0.5, 0.95);
        let width = ((img.width() as f64 * scale) as u32).max(1);
        let height = ((img.height() as f64 * scale) as u32).max(1);
        img = img.resize(width, height, FilterType::Triangle);
        quality = quality.saturating_sub(5).max(MIN_JPEG_QUALITY);
    }

    Err(anyhow!(
        "Image still exceeds {} bytes after {} compression passes",
        limit,
        MAX_ITERATIONS
    ))
}

fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            // The JPEG encoder has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            rgb.write_with_encoder(encoder)
                .context("Failed to encode JPEG")?;
        }
        other => {
            // Every supported encoder takes 8-bit RGB or RGBA
            let normalized = match img {
                DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img.clone(),
                _ if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
                _ => DynamicImage::ImageRgb8(img.to_rgb8()),
            };
            normalized
                .write_to(&mut Cursor::new(&mut buf), other)
                .with_context(|| format!("Failed to encode {:?}", other))?;
        }
    }
    Ok(buf)
}

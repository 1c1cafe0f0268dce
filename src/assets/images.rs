//! Image optimization with an on-disk cache

use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::utils::{hash_content, write_file};

/// Errors that can occur when processing images.
#[derive(Debug, Error)]
pub enum ImageError {
    /// An I/O error occurred while reading or writing image files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image decoding or encoding.
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// Re-encodes PNG and JPEG files, keeping whichever bytes are smaller
#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    cache_dir: PathBuf,
    jpeg_quality: u8,
}

impl ImageOptimizer {
    pub fn new(cache_dir: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            jpeg_quality,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.path(&config.images.cache_dir).join("img"),
            config.images.jpeg_quality,
        )
    }

    /// Formats this optimizer re-encodes
    pub fn supports(path: &Path) -> bool {
        matches!(
            ImageFormat::from_path(path),
            Ok(ImageFormat::Png | ImageFormat::Jpeg)
        )
    }

    /// Bytes to publish for the image at `path`
    ///
    /// Unsupported formats come back unchanged; an image that cannot be
    /// decoded is an error so the caller can fall back to a plain copy.
    pub fn optimize(&self, path: &Path) -> Result<Vec<u8>, ImageError> {
        let original = fs::read(path)?;

        let format = match ImageFormat::from_path(path) {
            Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => format,
            _ => return Ok(original),
        };

        let cache_path = self.cache_path(&original, format);
        if let Ok(cached) = fs::read(&cache_path) {
            debug!("Cache hit for {}", path.display());
            return Ok(cached);
        }

        let reencoded = reencode(&original, format, self.jpeg_quality)?;
        let best = if reencoded.len() < original.len() {
            reencoded
        } else {
            original
        };

        write_file(&cache_path, &best)?;
        Ok(best)
    }

    fn cache_path(&self, content: &[u8], format: ImageFormat) -> PathBuf {
        let (tag, ext) = match format {
            ImageFormat::Jpeg => (format!("jpeg-q{}", self.jpeg_quality), "jpg"),
            _ => ("png-best".to_string(), "png"),
        };

        let mut key = content.to_vec();
        key.extend_from_slice(tag.as_bytes());

        self.cache_dir.join(format!("{}.{}", hash_content(&key), ext))
    }
}

fn reencode(bytes: &[u8], format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory_with_format(bytes, format)?;
    let mut out = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality).encode(
                &rgb,
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )?;
        }
        _ => {
            PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
                .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())?;
        }
    }

    Ok(out)
}

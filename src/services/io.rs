//! Image I/O operations service
//!
//! This module separates decoding, encoding and file I/O from the
//! submission workflow, making the system more testable and maintainable.

use crate::{
    config::{ComposeConfig, OutputFormat},
    data_url,
    error::{BgComposeError, Result},
    types::RenderedOutput,
};
use image::DynamicImage;
use std::path::Path;

/// Service for handling image decode/encode and file output
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image from bytes
    ///
    /// # Arguments
    /// * `bytes` - Raw image data (PNG, JPEG, WebP, TIFF)
    ///
    /// # Returns
    /// * `Ok(DynamicImage)` - Successfully decoded image
    /// * `Err(BgComposeError::ImageLoad)` - Empty or undecodable data
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_bgcompose::services::ImageIOService;
    ///
    /// let image_data = std::fs::read("input.jpg")?;
    /// let image = ImageIOService::load_from_bytes(&image_data)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(BgComposeError::image_load("Image data is empty"));
        }
        image::load_from_memory(bytes).map_err(|e| {
            BgComposeError::image_load(format!(
                "Failed to decode image from {} bytes: {}",
                bytes.len(),
                e
            ))
        })
    }

    /// Encode an image in the given output format
    ///
    /// # Errors
    /// - Encoder failures (including WebP without the `webp-support` feature)
    pub fn encode(image: &DynamicImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        match format {
            OutputFormat::Png => {
                image
                    .write_to(&mut cursor, image::ImageFormat::Png)
                    .map_err(|e| BgComposeError::processing(format!("Failed to encode PNG: {}", e)))?;
            },
            OutputFormat::Jpeg => {
                let rgb_image = image.to_rgb8();
                let mut jpeg_encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, jpeg_quality);
                jpeg_encoder.encode_image(&rgb_image).map_err(|e| {
                    BgComposeError::processing(format!("Failed to encode JPEG: {}", e))
                })?;
            },
            OutputFormat::WebP => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut cursor, image::ImageFormat::WebP)
                    .map_err(|e| {
                        BgComposeError::processing(format!("Failed to encode WebP: {}", e))
                    })?;
            },
        }
        log::debug!("Encoded {}x{} image as {} ({} bytes)", image.width(), image.height(), format, buffer.len());
        Ok(buffer)
    }

    /// Encode an image and wrap it as a data URL
    ///
    /// # Errors
    /// - See [`ImageIOService::encode`]
    pub fn to_rendered_output(image: &DynamicImage, config: &ComposeConfig) -> Result<RenderedOutput> {
        let bytes = Self::encode(image, config.output_format, config.jpeg_quality)?;
        Ok(RenderedOutput {
            data_url: data_url::encode(&bytes, config.output_format.mime_type()),
            width: image.width(),
            height: image.height(),
            format: config.output_format,
        })
    }

    /// Write raw bytes to a file, creating parent directories
    ///
    /// # Errors
    /// - Directory creation or write failures
    pub fn write_bytes<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BgComposeError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to create output directory '{}': {}", parent.display(), e),
                    ))
                })?;
            }
        }

        std::fs::write(path_ref, bytes).map_err(|e| {
            BgComposeError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write '{}': {}", path_ref.display(), e),
            ))
        })?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| {
                matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif")
            })
    }
}

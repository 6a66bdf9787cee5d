//! Composite encoder.
//!
//! Encodes a composited surface for publication. The output format follows
//! the tile extension of the descriptor, so a WebP tile set produces a WebP
//! composite and a JPEG set a JPEG one.
//!
//! # Design Decisions
//!
//! - **WebP is lossless**: the `image` crate only ships a lossless WebP
//!   encoder. Quality therefore applies to JPEG output only.
//!
//! - **JPEG drops alpha**: blank cells become black in JPEG output. Use WebP
//!   or PNG tile sets when transparency matters.
//!
//! - **Unknown extensions fall back to PNG**.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageEncoder, RgbaImage};

use crate::error::RenderError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Output Format
// =============================================================================

/// Encoding used for a published composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Pick the output format for a tile extension.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "webp" => OutputFormat::WebP,
            "jpg" | "jpeg" => OutputFormat::Jpeg,
            _ => OutputFormat::Png,
        }
    }

    /// MIME type of the encoded output.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::WebP => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

// =============================================================================
// Encoded Output
// =============================================================================

/// An encoded composite ready to hand to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded bytes
    pub data: Bytes,

    /// Encoding used
    pub format: OutputFormat,

    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Render as a `data:` URL suitable for an element's image source.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            BASE64.encode(&self.data)
        )
    }
}

// =============================================================================
// Surface Encoder
// =============================================================================

/// Encoder for composited surfaces.
#[derive(Debug, Clone)]
pub struct SurfaceEncoder {
    quality: u8,
}

impl SurfaceEncoder {
    /// Create an encoder using the default JPEG quality.
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }

    /// Create an encoder with a JPEG quality, clamped to 1-100.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
        }
    }

    /// JPEG quality in use.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a surface in the given format.
    pub fn encode(&self, surface: &RgbaImage, format: OutputFormat) -> Result<EncodedImage, RenderError> {
        let (width, height) = surface.dimensions();
        let mut output = Vec::new();

        let result = match format {
            OutputFormat::WebP => WebPEncoder::new_lossless(&mut output).write_image(
                surface.as_raw(),
                width,
                height,
                image::ExtendedColorType::Rgba8,
            ),
            OutputFormat::Png => PngEncoder::new(&mut output).write_image(
                surface.as_raw(),
                width,
                height,
                image::ExtendedColorType::Rgba8,
            ),
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(surface.clone()).to_rgb8();
                JpegEncoder::new_with_quality(&mut output, self.quality).write_image(
                    rgb.as_raw(),
                    width,
                    height,
                    image::ExtendedColorType::Rgb8,
                )
            }
        };

        result.map_err(|e| RenderError::Encode {
            message: e.to_string(),
        })?;

        Ok(EncodedImage {
            data: Bytes::from(output),
            format,
            width,
            height,
        })
    }
}

impl Default for SurfaceEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp quality to valid range.
///
/// Values below 1 become 1, values above 100 become 100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================

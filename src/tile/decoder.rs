//! Tile decoder.
//!
//! Tiles arrive as encoded bytes (WebP by default, JPEG or PNG when the
//! descriptor says so). They are decoded once into RGBA and shared from the
//! image cache afterwards.
//!
//! The container format is sniffed from the bytes rather than trusted from
//! the file extension; the extension is only a fallback when sniffing fails.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, RgbaImage};

/// Decoder turning fetched tile bytes into RGBA pixels.
#[derive(Debug, Clone, Default)]
pub struct TileDecoder {}

impl TileDecoder {
    /// Create a new tile decoder.
    pub fn new() -> Self {
        Self {}
    }

    /// Decode tile bytes into an RGBA image.
    ///
    /// `extension_hint` is consulted only when the format cannot be guessed
    /// from the data itself.
    pub fn decode(&self, data: &[u8], extension_hint: Option<&str>) -> Result<RgbaImage, String> {
        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| e.to_string())?;

        if reader.format().is_none() {
            if let Some(hinted) = extension_hint.and_then(|ext| ImageFormat::from_extension(ext)) {
                reader.set_format(hinted);
            }
        }

        let img = reader.decode().map_err(|e| e.to_string())?;
        Ok(img.into_rgba8())
    }
}

/// File extension of a source identifier, if any.
pub(crate) fn extension_of(source_id: &str) -> Option<&str> {
    let file = source_id.rsplit(['/', '\\']).next().unwrap_or(source_id);
    file.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
}

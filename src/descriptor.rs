//! `data-pruner` descriptor parsing and validation.
//!
//! Every element that wants a responsive mosaic carries a JSON attribute such
//! as:
//!
//! ```text
//! <img data-pruner='{"name": "harbour", "tile": "14 8", "roi": 15, "path": "/tiles/"}'>
//! ```
//!
//! [`TileSetDescriptor::parse`] turns that attribute into a validated
//! descriptor or a [`DescriptorError`]. Optional fields are never assumed to
//! be present, and the older exporter spellings (`imageName`, `imagePath`,
//! `mobileBreak`, `scale`) are accepted as aliases.
//!
//! # Tile Naming
//!
//! Tiles are addressed as `{path}{name}-{index}.{extension}` where `index` is
//! the 1-based row-major position in the grid. The exporter writes exactly
//! these names, so [`TileSetDescriptor::source_id`] must not deviate from it.

use serde::Deserialize;
use serde_json::Value;

use crate::error::DescriptorError;
use crate::window::{
    resolve, GridSize, MobileScale, TileSize, TileWindow, Viewport, DEFAULT_MOBILE_BREAKPOINT,
};

/// Name of the element attribute carrying the descriptor.
pub const DESCRIPTOR_ATTRIBUTE: &str = "data-pruner";

/// Tile file extension used when the descriptor does not declare one.
pub const DEFAULT_IMAGE_EXTENSION: &str = "webp";

// =============================================================================
// Descriptor
// =============================================================================

/// A validated tile set declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSetDescriptor {
    /// Base name shared by every tile of the set
    pub name: String,

    /// Grid geometry
    pub grid: GridSize,

    /// Explicit tile size; `None` means "infer from the first tile"
    pub tile_size: Option<TileSize>,

    /// Location prefix prepended verbatim to every tile name
    pub path: String,

    /// 1-based row-major region of interest
    pub roi: Option<u32>,

    /// Tile scale on narrow viewports
    pub mobile_scale: Option<MobileScale>,

    /// Tile file extension, without a leading dot
    pub image_extension: String,
}

/// Raw attribute shape. Every field stays a loose JSON value so that type
/// errors are reported per field instead of as one opaque serde failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    #[serde(alias = "imageName")]
    name: Option<Value>,
    cols: Option<Value>,
    rows: Option<Value>,
    tile: Option<Value>,
    #[serde(alias = "imagePath")]
    path: Option<Value>,
    tile_width: Option<Value>,
    tile_height: Option<Value>,
    roi: Option<Value>,
    #[serde(alias = "scale")]
    mobile_scale: Option<Value>,
    #[serde(alias = "mobileBreak")]
    mobile_breakpoint: Option<Value>,
    image_extension: Option<Value>,
}

impl TileSetDescriptor {
    /// Parse and validate a descriptor from its attribute value.
    pub fn parse(attribute: &str) -> Result<Self, DescriptorError> {
        let value: Value = serde_json::from_str(attribute)
            .map_err(|e| DescriptorError::InvalidJson(e.to_string()))?;

        if !value.is_object() {
            return Err(DescriptorError::InvalidJson(
                "descriptor must be a JSON object".to_string(),
            ));
        }

        let raw: RawDescriptor = serde_json::from_value(value)
            .map_err(|e| DescriptorError::InvalidJson(e.to_string()))?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDescriptor) -> Result<Self, DescriptorError> {
        let name = required_string("name", raw.name)?;
        if name.is_empty() {
            return Err(DescriptorError::invalid("name", "must not be empty"));
        }

        let grid = parse_grid(raw.cols, raw.rows, raw.tile)?;

        // An empty path is legal: tiles then resolve relative to the fetch root.
        let path = required_string("path", raw.path)?;

        let tile_size = match (raw.tile_width, raw.tile_height) {
            (None, None) => None,
            (Some(w), Some(h)) => Some(TileSize::new(
                positive_u32("tileWidth", &w)?,
                positive_u32("tileHeight", &h)?,
            )),
            (Some(_), None) => return Err(DescriptorError::MissingField("tileHeight")),
            (None, Some(_)) => return Err(DescriptorError::MissingField("tileWidth")),
        };

        let roi = match raw.roi {
            None | Some(Value::Null) => None,
            Some(v) => {
                let roi = positive_u32("roi", &v)?;
                if u64::from(roi) > grid.tile_count() {
                    return Err(DescriptorError::invalid(
                        "roi",
                        format!("{} is outside the grid (1-{})", roi, grid.tile_count()),
                    ));
                }
                Some(roi)
            }
        };

        let mobile_scale = match raw.mobile_scale {
            None | Some(Value::Null) => None,
            Some(v) => {
                let factor = positive_f64("mobileScale", &v)?;
                let breakpoint = match raw.mobile_breakpoint {
                    None | Some(Value::Null) => DEFAULT_MOBILE_BREAKPOINT,
                    Some(b) => positive_u32("mobileBreakpoint", &b)?,
                };
                Some(MobileScale::new(factor, breakpoint))
            }
        };

        let image_extension = match raw.image_extension {
            None | Some(Value::Null) => DEFAULT_IMAGE_EXTENSION.to_string(),
            Some(v) => {
                let ext = string_value("imageExtension", v)?;
                let ext = ext.trim().trim_start_matches('.').to_string();
                if ext.is_empty() {
                    return Err(DescriptorError::invalid(
                        "imageExtension",
                        "must not be empty",
                    ));
                }
                ext
            }
        };

        Ok(Self {
            name,
            grid,
            tile_size,
            path,
            roi,
            mobile_scale,
            image_extension,
        })
    }

    /// Source identifier of the tile at a 1-based row-major index.
    pub fn source_id(&self, index: u32) -> String {
        format!(
            "{}{}-{}.{}",
            self.path, self.name, index, self.image_extension
        )
    }

    /// Source identifier of the tile at a zero-based grid position.
    pub fn source_id_at(&self, row: u32, col: u32) -> String {
        self.source_id(self.grid.index_of(row, col))
    }

    /// Resolve the tile window for a viewport, given the tile size to use.
    pub fn resolve_window(&self, tile_size: TileSize, viewport: Viewport) -> TileWindow {
        resolve(self.grid, tile_size, self.roi, viewport, self.mobile_scale)
    }
}

// =============================================================================
// Field Helpers
// =============================================================================

fn parse_grid(
    cols: Option<Value>,
    rows: Option<Value>,
    tile: Option<Value>,
) -> Result<GridSize, DescriptorError> {
    match (cols, rows) {
        (Some(c), Some(r)) => bounded_grid(
            "cols",
            GridSize::new(positive_u32("cols", &c)?, positive_u32("rows", &r)?),
        ),
        (Some(_), None) => Err(DescriptorError::MissingField("rows")),
        (None, Some(_)) => Err(DescriptorError::MissingField("cols")),
        (None, None) => {
            let value = tile.ok_or(DescriptorError::MissingField("cols"))?;
            let value = string_value("tile", value)?;
            let mut parts = value.split_whitespace();
            let (Some(c), Some(r), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(DescriptorError::invalid(
                    "tile",
                    format!("expected \"cols rows\", got {:?}", value),
                ));
            };
            bounded_grid(
                "tile",
                GridSize::new(positive_u32_str("tile", c)?, positive_u32_str("tile", r)?),
            )
        }
    }
}

/// Tile indices are `u32`, so the whole grid must be addressable by one.
fn bounded_grid(field: &'static str, grid: GridSize) -> Result<GridSize, DescriptorError> {
    if grid.cols.checked_mul(grid.rows).is_none() {
        return Err(DescriptorError::invalid(
            field,
            format!(
                "{}x{} grid has more than {} tiles",
                grid.cols,
                grid.rows,
                u32::MAX
            ),
        ));
    }
    Ok(grid)
}

fn required_string(field: &'static str, value: Option<Value>) -> Result<String, DescriptorError> {
    match value {
        None | Some(Value::Null) => Err(DescriptorError::MissingField(field)),
        Some(v) => string_value(field, v),
    }
}

fn string_value(field: &'static str, value: Value) -> Result<String, DescriptorError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(DescriptorError::invalid(
            field,
            format!("expected a string, got {}", other),
        )),
    }
}

/// Accepts a JSON integer or a string of digits, and rejects zero.
fn positive_u32(field: &'static str, value: &Value) -> Result<u32, DescriptorError> {
    match value {
        Value::Number(n) => {
            let n = n
                .as_u64()
                .ok_or_else(|| DescriptorError::invalid(field, format!("{} is not a positive integer", n)))?;
            u32::try_from(n)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| DescriptorError::invalid(field, format!("{} is out of range", n)))
        }
        Value::String(s) => positive_u32_str(field, s.trim()),
        other => Err(DescriptorError::invalid(
            field,
            format!("expected a positive integer, got {}", other),
        )),
    }
}

fn positive_u32_str(field: &'static str, s: &str) -> Result<u32, DescriptorError> {
    match s.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DescriptorError::invalid(
            field,
            format!("{:?} is not a positive integer", s),
        )),
    }
}

fn positive_f64(field: &'static str, value: &Value) -> Result<f64, DescriptorError> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(DescriptorError::invalid(
            field,
            format!("expected a positive number, got {}", value),
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================

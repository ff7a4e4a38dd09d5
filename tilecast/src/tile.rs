//! Tile primitives shared across the renderer core.
//!
//! Coordinates, negotiated output formats, and the backend-agnostic tile
//! payload every renderer ultimately produces.

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Edge length in pixels of every raster tile produced by this crate.
pub const TILE_SIZE: u32 = 256;

/// Address of a single tile in the XYZ tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level
    pub zoom: u8,
    /// Column (X coordinate in the tile grid)
    pub x: u32,
    /// Row (Y coordinate in the tile grid)
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Output encodings negotiated between a request and a renderer backend.
///
/// The request carries the format as a string; unknown strings fail to
/// parse and surface as an unsupported-format failure at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileFormat {
    /// 8-bit paletted PNG
    Png,
    /// 32-bit RGBA PNG
    Png32,
    /// UTF-grid interactivity JSON
    UtfGrid,
    /// Binary vector tile
    Mvt,
    /// Time-series aggregation, JSON encoding
    SeriesJson,
    /// Time-series aggregation, binary encoding
    SeriesBin,
}

impl TileFormat {
    /// The wire name of this format, as it appears in request parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Png32 => "png32",
            TileFormat::UtfGrid => "grid.json",
            TileFormat::Mvt => "mvt",
            TileFormat::SeriesJson => "series.json",
            TileFormat::SeriesBin => "series.bin",
        }
    }

    /// MIME type for HTTP responses carrying this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Png | TileFormat::Png32 => "image/png",
            TileFormat::UtfGrid | TileFormat::SeriesJson => "application/json",
            TileFormat::Mvt => "application/x-protobuf",
            TileFormat::SeriesBin => "application/octet-stream",
        }
    }

    /// True for image formats that can take a placeholder tile on failure.
    pub fn is_raster(&self) -> bool {
        matches!(self, TileFormat::Png | TileFormat::Png32)
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(TileFormat::Png),
            "png32" => Ok(TileFormat::Png32),
            "grid.json" => Ok(TileFormat::UtfGrid),
            "mvt" => Ok(TileFormat::Mvt),
            "series.json" => Ok(TileFormat::SeriesJson),
            "series.bin" => Ok(TileFormat::SeriesBin),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// A format string no backend knows about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tile format '{0}'")]
pub struct UnknownFormat(pub String);

/// A finished tile: payload bytes plus the format they are encoded in.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Encoded tile payload
    pub data: Bytes,
    /// Encoding of `data`
    pub format: TileFormat,
}

impl Tile {
    /// Create a tile from encoded bytes.
    pub fn new(data: impl Into<Bytes>, format: TileFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    /// MIME type matching this tile's payload.
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Failures while producing a single tile.
///
/// These are render-time faults, distinct from the construction-time
/// failures in [`crate::renderer::ConstructionError`]. The adapter decides
/// whether they propagate or get replaced by a placeholder tile.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Upstream fetch failed (remote-fetch backend)
    #[error("upstream fetch failed: {0}")]
    Fetch(String),

    /// Rendering engine reported a failure
    #[error("render failed: {0}")]
    Render(String),

    /// Output encoding failed
    #[error("encode failed: {0}")]
    Encode(String),

    /// The render exceeded its time budget
    #[error("tile render timed out after {0:?}")]
    Timeout(Duration),
}

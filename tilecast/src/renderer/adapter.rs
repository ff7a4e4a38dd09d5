//! Uniform renderer adapter.
//!
//! Wraps a raw backend renderer so every backend exposes the same render
//! surface and the same tile-error policy, hiding backend-specific
//! failure shapes from downstream consumers.

use super::backend::Renderer;
use crate::tile::{Tile, TileCoord, TileError, TileFormat, TILE_SIZE};
use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::OnceLock;
use tracing::warn;

/// Policy for per-tile render faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileErrorStrategy {
    /// Propagate the failure to the caller.
    #[default]
    Fail,
    /// Serve a blank tile instead. Only raster formats can take a
    /// placeholder; other formats propagate regardless.
    Placeholder,
}

/// The adapted renderer handed back by the dispatcher.
///
/// Applies the tile-error policy uniformly and passes metadata through
/// untouched.
pub struct RendererAdapter {
    inner: Box<dyn Renderer>,
    format: TileFormat,
    on_tile_error: TileErrorStrategy,
}

impl RendererAdapter {
    /// Wrap a raw renderer.
    pub fn new(
        inner: Box<dyn Renderer>,
        format: TileFormat,
        on_tile_error: TileErrorStrategy,
    ) -> Self {
        Self {
            inner,
            format,
            on_tile_error,
        }
    }

    /// The output format this renderer was bound to.
    pub fn format(&self) -> TileFormat {
        self.format
    }
}

#[async_trait]
impl Renderer for RendererAdapter {
    async fn render_tile(&self, coord: TileCoord) -> Result<Tile, TileError> {
        match self.inner.render_tile(coord).await {
            Ok(tile) => Ok(tile),
            Err(err)
                if self.on_tile_error == TileErrorStrategy::Placeholder
                    && self.format.is_raster() =>
            {
                warn!(%coord, error = %err, "substituting blank tile for failed render");
                Ok(Tile::new(blank_tile().clone(), self.format))
            }
            Err(err) => Err(err),
        }
    }

    fn metadata(&self) -> serde_json::Value {
        self.inner.metadata()
    }
}

/// Fully transparent 256x256 PNG, encoded once per process.
fn blank_tile() -> &'static Bytes {
    static BLANK: OnceLock<Bytes> = OnceLock::new();
    BLANK.get_or_init(|| {
        let canvas = RgbaImage::new(TILE_SIZE, TILE_SIZE);
        let mut buf = Cursor::new(Vec::new());
        // encoding a fresh in-memory image cannot fail
        image::DynamicImage::ImageRgba8(canvas)
            .write_to(&mut buf, image::ImageFormat::Png)
            .expect("png encode of blank tile");
        Bytes::from(buf.into_inner())
    })
}

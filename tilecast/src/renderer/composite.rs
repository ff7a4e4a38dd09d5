//! Composite backend.
//!
//! Blends any mixture of layer types into one raster output. Each
//! resolved layer gets its own adapted sub-renderer from the layer's
//! declared-type backend; tiles are alpha-composited in resolved order,
//! whatever order the sub-renders complete in.

use super::adapter::RendererAdapter;
use super::backend::{Renderer, RendererBackend, RendererOptions};
use super::error::ConstructionError;
use super::registry::{BackendKind, RendererRegistry};
use crate::mapconfig::MapConfig;
use crate::tile::{Tile, TileCoord, TileError, TileFormat, TILE_SIZE};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::try_join_all;
use image::{imageops, RgbaImage};
use serde_json::json;
use std::io::Cursor;
use std::sync::{Arc, Weak};
use tracing::debug;

/// The composite backend.
///
/// Holds a weak handle back to the registry so it can fan out to its
/// peer backends without keeping the registry alive.
pub struct CompositeBackend {
    registry: Weak<RendererRegistry>,
}

impl CompositeBackend {
    pub(crate) fn new(registry: Weak<RendererRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RendererBackend for CompositeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Composite
    }

    fn supports_format(&self, format: TileFormat) -> bool {
        format == TileFormat::Png
    }

    async fn create_renderer(
        &self,
        config: &MapConfig,
        format: TileFormat,
        options: &RendererOptions,
    ) -> Result<Box<dyn Renderer>, ConstructionError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| ConstructionError::Backend("renderer registry dropped".to_string()))?;

        // sub-renderers may construct concurrently; try_join_all keeps
        // the assembled parts in resolved-layer order either way
        let parts = try_join_all(options.layers.iter().map(|&index| {
            let registry = Arc::clone(&registry);
            let sub_options = RendererOptions {
                layers: vec![index],
                limits: options.limits.clone(),
                on_tile_error: options.on_tile_error,
            };

            async move {
                let kind = config
                    .layer_type(index)
                    .map(BackendKind::from)
                    .ok_or_else(|| {
                        ConstructionError::Backend(format!("layer {index} out of range"))
                    })?;

                let backend = registry.get(kind).ok_or_else(|| {
                    ConstructionError::Backend(format!(
                        "no renderer registered for type '{kind}'"
                    ))
                })?;
                if !backend.supports_format(TileFormat::Png) {
                    return Err(ConstructionError::Backend(format!(
                        "'{kind}' layers cannot take part in a composite"
                    )));
                }

                let raw = backend
                    .create_renderer(config, TileFormat::Png, &sub_options)
                    .await?;
                Ok(CompositePart {
                    name: config.layer_name(index),
                    renderer: backend.create_adapter(
                        raw,
                        TileFormat::Png,
                        sub_options.on_tile_error,
                    ),
                })
            }
        }))
        .await?;

        debug!(parts = parts.len(), "composite renderer bound");
        Ok(Box::new(CompositeRenderer { parts, format }))
    }
}

struct CompositePart {
    name: String,
    renderer: RendererAdapter,
}

struct CompositeRenderer {
    parts: Vec<CompositePart>,
    format: TileFormat,
}

#[async_trait]
impl Renderer for CompositeRenderer {
    async fn render_tile(&self, coord: TileCoord) -> Result<Tile, TileError> {
        let tiles = try_join_all(
            self.parts
                .iter()
                .map(|part| part.renderer.render_tile(coord)),
        )
        .await?;

        // merge in resolved order, independent of completion order
        let mut canvas = RgbaImage::new(TILE_SIZE, TILE_SIZE);
        for tile in &tiles {
            let decoded = image::load_from_memory(&tile.data)
                .map_err(|err| TileError::Render(format!("sub-tile decode failed: {err}")))?
                .to_rgba8();
            imageops::overlay(&mut canvas, &decoded, 0, 0);
        }

        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(canvas)
            .write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|err| TileError::Encode(err.to_string()))?;

        Ok(Tile::new(Bytes::from(buf.into_inner()), self.format))
    }

    fn metadata(&self) -> serde_json::Value {
        json!({
            "layers": self.parts.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        })
    }
}

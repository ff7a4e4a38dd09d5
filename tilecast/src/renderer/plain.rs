//! Flat-fill backend.
//!
//! A plain layer is a single color covering the whole tile. The tile is
//! encoded once at construction and served from memory afterwards.

use super::backend::{layer_options, Renderer, RendererBackend, RendererOptions};
use super::error::ConstructionError;
use super::registry::BackendKind;
use crate::mapconfig::{LayerType, MapConfig};
use crate::tile::{Tile, TileCoord, TileError, TileFormat, TILE_SIZE};
use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use serde::Deserialize;
use std::io::Cursor;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlainLayerOptions {
    color: Option<String>,
}

/// The flat-fill backend.
#[derive(Debug, Default)]
pub struct PlainBackend;

impl PlainBackend {
    /// New flat-fill backend.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RendererBackend for PlainBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Plain
    }

    fn supports_format(&self, format: TileFormat) -> bool {
        format.is_raster()
    }

    async fn create_renderer(
        &self,
        config: &MapConfig,
        format: TileFormat,
        options: &RendererOptions,
    ) -> Result<Box<dyn Renderer>, ConstructionError> {
        // a plain renderer serves exactly one layer; multi-layer plain
        // selections arrive here one layer at a time via the composite
        let index = match options.layers[..] {
            [index] => index,
            _ => {
                return Err(ConstructionError::Backend(format!(
                    "plain renderer expects exactly one layer, got {}",
                    options.layers.len()
                )))
            }
        };

        let layer = config
            .layer(index)
            .ok_or_else(|| ConstructionError::Backend(format!("layer {index} out of range")))?;

        if layer.kind != LayerType::Plain {
            return Err(ConstructionError::InvalidOption {
                layer: index,
                option: "type",
                message: format!("expected a plain layer, got '{}'", layer.kind),
            });
        }

        let opts: PlainLayerOptions = layer_options(layer, index)?;
        let color = opts.color.ok_or(ConstructionError::MissingOption {
            layer: index,
            option: "color",
        })?;
        let rgba = parse_color(&color).map_err(|message| ConstructionError::InvalidOption {
            layer: index,
            option: "color",
            message,
        })?;

        let data = encode_fill(rgba).map_err(ConstructionError::Backend)?;
        Ok(Box::new(PlainRenderer {
            tile: Tile::new(data, format),
        }))
    }
}

struct PlainRenderer {
    tile: Tile,
}

#[async_trait]
impl Renderer for PlainRenderer {
    async fn render_tile(&self, _coord: TileCoord) -> Result<Tile, TileError> {
        Ok(self.tile.clone())
    }
}

/// Parse `#rgb`, `#rrggbb`, or `#rrggbbaa` into RGBA.
fn parse_color(color: &str) -> Result<Rgba<u8>, String> {
    let hex = color
        .strip_prefix('#')
        .ok_or_else(|| format!("'{color}' is not a hex color"))?;

    let channel =
        |s: &str| u8::from_str_radix(s, 16).map_err(|_| format!("'{color}' is not a hex color"));

    match hex.len() {
        3 => {
            let mut out = [0u8; 4];
            for (slot, c) in out.iter_mut().zip(hex.chars()) {
                let v = channel(&c.to_string())?;
                *slot = v << 4 | v;
            }
            out[3] = 255;
            Ok(Rgba(out))
        }
        6 | 8 => {
            let mut out = [0, 0, 0, 255u8];
            for (i, slot) in out.iter_mut().take(hex.len() / 2).enumerate() {
                *slot = channel(&hex[i * 2..i * 2 + 2])?;
            }
            Ok(Rgba(out))
        }
        _ => Err(format!("'{color}' is not a hex color")),
    }
}

/// Encode a solid-color PNG tile.
fn encode_fill(color: Rgba<u8>) -> Result<Bytes, String> {
    let canvas = RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, color);
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|err| format!("png encode failed: {err}"))?;
    Ok(Bytes::from(buf.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderLimits;
    use crate::mapconfig::LayerDef;
    use crate::renderer::adapter::TileErrorStrategy;
    use serde_json::json;

    fn options(layers: Vec<usize>) -> RendererOptions {
        RendererOptions {
            layers,
            limits: RenderLimits::default(),
            on_tile_error: TileErrorStrategy::Fail,
        }
    }

    fn plain_config(color: &str) -> MapConfig {
        MapConfig::new(vec![
            LayerDef::new(LayerType::Plain).with_options(json!({"color": color}))
        ])
    }

    #[test]
    fn test_parse_color_forms() {
        assert_eq!(parse_color("#f00").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_color("#00ff00").unwrap(), Rgba([0, 255, 0, 255]));
        assert_eq!(parse_color("#0000ff80").unwrap(), Rgba([0, 0, 255, 128]));
    }

    #[test]
    fn test_parse_color_rejects_garbage() {
        assert!(parse_color("red").is_err());
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#gggggg").is_err());
    }

    #[test]
    fn test_raster_only() {
        let backend = PlainBackend::new();
        assert!(backend.supports_format(TileFormat::Png));
        assert!(backend.supports_format(TileFormat::Png32));
        assert!(!backend.supports_format(TileFormat::Mvt));
    }

    #[tokio::test]
    async fn test_renders_the_configured_color() {
        let backend = PlainBackend::new();
        let renderer = backend
            .create_renderer(&plain_config("#ff0000"), TileFormat::Png, &options(vec![0]))
            .await
            .unwrap();

        let tile = renderer.render_tile(TileCoord::new(5, 1, 2)).await.unwrap();
        let decoded = image::load_from_memory(&tile.data).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (TILE_SIZE, TILE_SIZE));
        assert_eq!(decoded.get_pixel(100, 100).0, [255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn test_missing_color_fails_construction() {
        let backend = PlainBackend::new();
        let config = MapConfig::new(vec![LayerDef::new(LayerType::Plain)]);

        let err = backend
            .create_renderer(&config, TileFormat::Png, &options(vec![0]))
            .await
            .err().unwrap();
        assert!(matches!(
            err,
            ConstructionError::MissingOption { option: "color", .. }
        ));
    }

    #[tokio::test]
    async fn test_multi_layer_selection_rejected() {
        let backend = PlainBackend::new();
        let err = backend
            .create_renderer(&plain_config("#fff"), TileFormat::Png, &options(vec![0, 0]))
            .await
            .err().unwrap();
        assert!(matches!(err, ConstructionError::Backend(_)));
    }
}

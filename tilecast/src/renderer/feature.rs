//! Primary feature-rendering backend.
//!
//! Validates and binds feature layers (source query, cartographic style,
//! interactivity columns) and delegates the actual cartography to an
//! injected [`FeatureEngine`]. The dispatch core never interprets the
//! tile bytes an engine produces.

use super::backend::{layer_options, Renderer, RendererBackend, RendererOptions};
use super::error::ConstructionError;
use super::registry::BackendKind;
use crate::config::RenderLimits;
use crate::mapconfig::{LayerType, MapConfig};
use crate::tile::{Tile, TileCoord, TileError, TileFormat};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

/// Rendering engine collaborator for feature layers.
///
/// Implementations own symbolizer evaluation, raster composition, and
/// vector-tile encoding for the generic path.
#[async_trait]
pub trait FeatureEngine: Send + Sync {
    /// Render one tile for the prepared spec.
    async fn render(&self, spec: &FeatureTileSpec, coord: TileCoord) -> Result<Bytes, TileError>;
}

/// Everything an engine needs to render one bound request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTileSpec {
    /// Negotiated output format
    pub format: TileFormat,
    /// Validated layers, in resolved order
    pub layers: Vec<FeatureLayerSpec>,
}

/// A single validated feature layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayerSpec {
    /// Display name (explicit id or positional)
    pub name: String,
    /// Source query for the layer's features
    pub sql: String,
    /// Cartographic style; present whenever the output is raster
    pub style: Option<String>,
    /// Feature properties exposed to interactivity output. The
    /// vector-optimized backend also uses this as its projected column
    /// set.
    pub interactivity: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeatureLayerOptions {
    sql: Option<String>,
    style: Option<String>,
    interactivity: Vec<String>,
}

/// Validate the resolved layers into a render spec.
///
/// Shared with the vector-optimized backend, which applies the same
/// layer-level rules before projecting columns.
pub(crate) fn feature_spec(
    config: &MapConfig,
    layers: &[usize],
    format: TileFormat,
) -> Result<FeatureTileSpec, ConstructionError> {
    let mut specs = Vec::with_capacity(layers.len());

    for &index in layers {
        let layer = config.layer(index).ok_or_else(|| {
            ConstructionError::Backend(format!("layer {index} out of range"))
        })?;

        if layer.kind != LayerType::Feature {
            return Err(ConstructionError::InvalidOption {
                layer: index,
                option: "type",
                message: format!("expected a feature layer, got '{}'", layer.kind),
            });
        }

        let opts: FeatureLayerOptions = layer_options(layer, index)?;

        let sql = opts
            .sql
            .filter(|sql| !sql.trim().is_empty())
            .ok_or(ConstructionError::MissingOption {
                layer: index,
                option: "sql",
            })?;

        let has_style = opts.style.as_deref().map_or(false, |s| !s.trim().is_empty());
        if format.is_raster() && !has_style {
            return Err(ConstructionError::InvalidStyle {
                layer: index,
                message: "raster output requires a style".to_string(),
            });
        }

        if format == TileFormat::UtfGrid && opts.interactivity.is_empty() {
            return Err(ConstructionError::MissingOption {
                layer: index,
                option: "interactivity",
            });
        }

        specs.push(FeatureLayerSpec {
            name: config.layer_name(index),
            sql,
            style: opts.style,
            interactivity: opts.interactivity,
        });
    }

    Ok(FeatureTileSpec {
        format,
        layers: specs,
    })
}

/// The primary-tile backend.
pub struct FeatureBackend {
    engine: Arc<dyn FeatureEngine>,
}

impl FeatureBackend {
    /// Backend delegating to `engine`.
    pub fn new(engine: Arc<dyn FeatureEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl RendererBackend for FeatureBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Feature
    }

    fn supports_format(&self, format: TileFormat) -> bool {
        matches!(
            format,
            TileFormat::Png | TileFormat::Png32 | TileFormat::UtfGrid | TileFormat::Mvt
        )
    }

    async fn create_renderer(
        &self,
        config: &MapConfig,
        format: TileFormat,
        options: &RendererOptions,
    ) -> Result<Box<dyn Renderer>, ConstructionError> {
        let spec = feature_spec(config, &options.layers, format)?;
        debug!(layers = spec.layers.len(), %format, "feature renderer bound");

        Ok(Box::new(FeatureRenderer {
            engine: Arc::clone(&self.engine),
            spec,
            limits: options.limits.clone(),
        }))
    }
}

struct FeatureRenderer {
    engine: Arc<dyn FeatureEngine>,
    spec: FeatureTileSpec,
    limits: RenderLimits,
}

#[async_trait]
impl Renderer for FeatureRenderer {
    async fn render_tile(&self, coord: TileCoord) -> Result<Tile, TileError> {
        let budget = self.limits.render_timeout();
        let data = match timeout(budget, self.engine.render(&self.spec, coord)).await {
            Ok(result) => result?,
            Err(_) => return Err(TileError::Timeout(budget)),
        };
        Ok(Tile::new(data, self.spec.format))
    }

    fn metadata(&self) -> serde_json::Value {
        json!({
            "layers": self.spec.layers.iter().map(|l| l.name.as_str()).collect::<Vec<_>>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapconfig::LayerDef;
    use crate::renderer::adapter::TileErrorStrategy;
    use serde_json::json;
    use std::time::Duration;

    struct TaggedEngine;

    #[async_trait]
    impl FeatureEngine for TaggedEngine {
        async fn render(
            &self,
            _spec: &FeatureTileSpec,
            _coord: TileCoord,
        ) -> Result<Bytes, TileError> {
            Ok(Bytes::from_static(b"feature-tile"))
        }
    }

    struct StallingEngine;

    #[async_trait]
    impl FeatureEngine for StallingEngine {
        async fn render(
            &self,
            _spec: &FeatureTileSpec,
            _coord: TileCoord,
        ) -> Result<Bytes, TileError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Bytes::new())
        }
    }

    fn feature_layer(sql: &str) -> LayerDef {
        LayerDef::new(LayerType::Feature).with_options(json!({"sql": sql}))
    }

    fn options(layers: Vec<usize>) -> RendererOptions {
        RendererOptions {
            layers,
            limits: RenderLimits::default(),
            on_tile_error: TileErrorStrategy::Fail,
        }
    }

    #[test]
    fn test_supported_formats() {
        let backend = FeatureBackend::new(Arc::new(TaggedEngine));
        assert!(backend.supports_format(TileFormat::Png));
        assert!(backend.supports_format(TileFormat::Mvt));
        assert!(backend.supports_format(TileFormat::UtfGrid));
        assert!(!backend.supports_format(TileFormat::SeriesJson));
    }

    #[test]
    fn test_spec_requires_sql() {
        let config = MapConfig::new(vec![LayerDef::new(LayerType::Feature)]);
        let err = feature_spec(&config, &[0], TileFormat::Mvt).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::MissingOption {
                layer: 0,
                option: "sql"
            }
        ));
    }

    #[test]
    fn test_spec_requires_style_for_raster() {
        let config = MapConfig::new(vec![feature_layer("select * from t")]);
        let err = feature_spec(&config, &[0], TileFormat::Png).unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidStyle { layer: 0, .. }));

        // the same layer is fine for vector output
        assert!(feature_spec(&config, &[0], TileFormat::Mvt).is_ok());
    }

    #[test]
    fn test_spec_requires_interactivity_for_grid() {
        let config = MapConfig::new(vec![feature_layer("select * from t")]);
        let err = feature_spec(&config, &[0], TileFormat::UtfGrid).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::MissingOption {
                layer: 0,
                option: "interactivity"
            }
        ));
    }

    #[test]
    fn test_spec_rejects_foreign_layer_type() {
        let config = MapConfig::new(vec![LayerDef::new(LayerType::Plain)]);
        let err = feature_spec(&config, &[0], TileFormat::Mvt).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::InvalidOption {
                layer: 0,
                option: "type",
                ..
            }
        ));
    }

    #[test]
    fn test_spec_keeps_resolved_order_and_names() {
        let config = MapConfig::new(vec![
            LayerDef::new(LayerType::Feature)
                .with_id("roads")
                .with_options(json!({"sql": "select * from roads"})),
            feature_layer("select * from pois"),
        ]);

        let spec = feature_spec(&config, &[1, 0], TileFormat::Mvt).unwrap();
        assert_eq!(spec.layers[0].name, "layer1");
        assert_eq!(spec.layers[1].name, "roads");
    }

    #[tokio::test]
    async fn test_renderer_delegates_to_engine() {
        let backend = FeatureBackend::new(Arc::new(TaggedEngine));
        let config = MapConfig::new(vec![feature_layer("select 1")]);
        let renderer = backend
            .create_renderer(&config, TileFormat::Mvt, &options(vec![0]))
            .await
            .unwrap();

        let tile = renderer.render_tile(TileCoord::new(1, 0, 0)).await.unwrap();
        assert_eq!(&tile.data[..], b"feature-tile");
        assert_eq!(tile.format, TileFormat::Mvt);
        assert_eq!(renderer.metadata(), json!({"layers": ["layer0"]}));
    }

    #[tokio::test]
    async fn test_renderer_honors_render_timeout() {
        let backend = FeatureBackend::new(Arc::new(StallingEngine));
        let config = MapConfig::new(vec![feature_layer("select 1")]);
        let mut opts = options(vec![0]);
        opts.limits.render_timeout_ms = 20;

        let renderer = backend
            .create_renderer(&config, TileFormat::Mvt, &opts)
            .await
            .unwrap();

        let err = renderer.render_tile(TileCoord::new(1, 0, 0)).await.unwrap_err();
        assert!(matches!(err, TileError::Timeout(_)));
    }
}

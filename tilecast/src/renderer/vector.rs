//! Vector-optimized backend.
//!
//! Used when the deployment projects columns storage-side and the request
//! asks for binary vector tiles. Layer validation matches the primary
//! feature backend; the difference is the engine contract: a
//! [`VectorEngine`] materializes only each layer's declared
//! `interactivity` columns instead of the full feature row.

use super::backend::{Renderer, RendererBackend, RendererOptions};
use super::error::ConstructionError;
use super::feature::{feature_spec, FeatureTileSpec};
use super::registry::BackendKind;
use crate::config::RenderLimits;
use crate::mapconfig::MapConfig;
use crate::tile::{Tile, TileCoord, TileError, TileFormat};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

/// Storage-side vector tile encoder.
///
/// Implementations push the query and the projected column set down to
/// storage and return the finished binary tile; no feature data crosses
/// back through this crate.
#[async_trait]
pub trait VectorEngine: Send + Sync {
    /// Encode one binary vector tile for the projected spec.
    async fn encode(&self, spec: &FeatureTileSpec, coord: TileCoord) -> Result<Bytes, TileError>;
}

/// The vector-optimized backend.
pub struct VectorBackend {
    engine: Arc<dyn VectorEngine>,
}

impl VectorBackend {
    /// Backend delegating to `engine`.
    pub fn new(engine: Arc<dyn VectorEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl RendererBackend for VectorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vector
    }

    fn supports_format(&self, format: TileFormat) -> bool {
        format == TileFormat::Mvt
    }

    async fn create_renderer(
        &self,
        config: &MapConfig,
        format: TileFormat,
        options: &RendererOptions,
    ) -> Result<Box<dyn Renderer>, ConstructionError> {
        let spec = feature_spec(config, &options.layers, format)?;
        debug!(layers = spec.layers.len(), "vector renderer bound");

        Ok(Box::new(VectorRenderer {
            engine: Arc::clone(&self.engine),
            spec,
            limits: options.limits.clone(),
        }))
    }
}

struct VectorRenderer {
    engine: Arc<dyn VectorEngine>,
    spec: FeatureTileSpec,
    limits: RenderLimits,
}

#[async_trait]
impl Renderer for VectorRenderer {
    async fn render_tile(&self, coord: TileCoord) -> Result<Tile, TileError> {
        let budget = self.limits.render_timeout();
        let data = match timeout(budget, self.engine.encode(&self.spec, coord)).await {
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
    use crate::mapconfig::{LayerDef, LayerType};
    use crate::renderer::adapter::TileErrorStrategy;
    use serde_json::json;

    struct RecordingEngine;

    #[async_trait]
    impl VectorEngine for RecordingEngine {
        async fn encode(
            &self,
            spec: &FeatureTileSpec,
            _coord: TileCoord,
        ) -> Result<Bytes, TileError> {
            // echo the projected columns so tests can observe them
            let columns: Vec<_> = spec
                .layers
                .iter()
                .flat_map(|l| l.interactivity.iter().cloned())
                .collect();
            Ok(Bytes::from(columns.join(",")))
        }
    }

    fn options() -> RendererOptions {
        RendererOptions {
            layers: vec![0],
            limits: RenderLimits::default(),
            on_tile_error: TileErrorStrategy::Fail,
        }
    }

    #[test]
    fn test_only_mvt_is_supported() {
        let backend = VectorBackend::new(Arc::new(RecordingEngine));
        assert!(backend.supports_format(TileFormat::Mvt));
        assert!(!backend.supports_format(TileFormat::Png));
        assert!(!backend.supports_format(TileFormat::UtfGrid));
    }

    #[tokio::test]
    async fn test_projected_columns_reach_the_engine() {
        let backend = VectorBackend::new(Arc::new(RecordingEngine));
        let config = MapConfig::new(vec![LayerDef::new(LayerType::Feature).with_options(
            json!({"sql": "select * from pois", "interactivity": ["name", "address"]}),
        )]);

        let renderer = backend
            .create_renderer(&config, TileFormat::Mvt, &options())
            .await
            .unwrap();
        let tile = renderer.render_tile(TileCoord::new(1, 0, 0)).await.unwrap();

        assert_eq!(&tile.data[..], b"name,address");
        assert_eq!(tile.format, TileFormat::Mvt);
    }

    #[tokio::test]
    async fn test_validation_matches_feature_backend() {
        let backend = VectorBackend::new(Arc::new(RecordingEngine));
        let config = MapConfig::new(vec![LayerDef::new(LayerType::Feature)]);

        let err = backend
            .create_renderer(&config, TileFormat::Mvt, &options())
            .await
            .err().unwrap();
        assert!(matches!(
            err,
            ConstructionError::MissingOption { option: "sql", .. }
        ));
    }
}

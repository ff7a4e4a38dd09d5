//! Time-series aggregation backend.
//!
//! Binds layers that aggregate features over a time column into animation
//! frames. The aggregation itself happens in an injected
//! [`TimeSeriesEngine`].

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

/// Aggregation engine collaborator for time-series layers.
#[async_trait]
pub trait TimeSeriesEngine: Send + Sync {
    /// Produce one tile of aggregated frames for the bound spec.
    async fn render(&self, spec: &TimeSeriesSpec, coord: TileCoord) -> Result<Bytes, TileError>;
}

/// Everything the engine needs for one bound request.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesSpec {
    /// Negotiated output format
    pub format: TileFormat,
    /// Validated layers, in resolved order
    pub layers: Vec<TimeSeriesLayerSpec>,
}

/// A single validated time-series layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesLayerSpec {
    /// Display name (explicit id or positional)
    pub name: String,
    /// Source query for the layer's features
    pub sql: String,
    /// Column holding each feature's timestamp
    pub time_column: String,
    /// Number of aggregation buckets across the animation
    pub steps: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimeSeriesLayerOptions {
    sql: Option<String>,
    time_column: Option<String>,
    steps: Option<u32>,
}

/// The time-series backend.
pub struct TimeSeriesBackend {
    engine: Arc<dyn TimeSeriesEngine>,
}

impl TimeSeriesBackend {
    /// Backend delegating to `engine`.
    pub fn new(engine: Arc<dyn TimeSeriesEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl RendererBackend for TimeSeriesBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::TimeSeries
    }

    fn supports_format(&self, format: TileFormat) -> bool {
        matches!(format, TileFormat::SeriesJson | TileFormat::SeriesBin)
    }

    async fn create_renderer(
        &self,
        config: &MapConfig,
        format: TileFormat,
        options: &RendererOptions,
    ) -> Result<Box<dyn Renderer>, ConstructionError> {
        let mut layers = Vec::with_capacity(options.layers.len());

        for &index in &options.layers {
            let layer = config.layer(index).ok_or_else(|| {
                ConstructionError::Backend(format!("layer {index} out of range"))
            })?;

            if layer.kind != LayerType::TimeSeries {
                return Err(ConstructionError::InvalidOption {
                    layer: index,
                    option: "type",
                    message: format!("expected a timeseries layer, got '{}'", layer.kind),
                });
            }

            let opts: TimeSeriesLayerOptions = layer_options(layer, index)?;

            let sql = opts
                .sql
                .filter(|sql| !sql.trim().is_empty())
                .ok_or(ConstructionError::MissingOption {
                    layer: index,
                    option: "sql",
                })?;
            let time_column = opts
                .time_column
                .filter(|column| !column.trim().is_empty())
                .ok_or(ConstructionError::MissingOption {
                    layer: index,
                    option: "time_column",
                })?;

            let steps = opts.steps.unwrap_or(1);
            if steps == 0 {
                return Err(ConstructionError::InvalidOption {
                    layer: index,
                    option: "steps",
                    message: "must be at least 1".to_string(),
                });
            }

            layers.push(TimeSeriesLayerSpec {
                name: config.layer_name(index),
                sql,
                time_column,
                steps,
            });
        }

        let spec = TimeSeriesSpec { format, layers };
        debug!(layers = spec.layers.len(), "timeseries renderer bound");

        Ok(Box::new(TimeSeriesRenderer {
            engine: Arc::clone(&self.engine),
            spec,
            limits: options.limits.clone(),
        }))
    }
}

struct TimeSeriesRenderer {
    engine: Arc<dyn TimeSeriesEngine>,
    spec: TimeSeriesSpec,
    limits: RenderLimits,
}

#[async_trait]
impl Renderer for TimeSeriesRenderer {
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

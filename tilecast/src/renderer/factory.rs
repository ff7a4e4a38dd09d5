//! Renderer dispatch.
//!
//! The factory routes one request (map configuration, layer selector,
//! output format) to the backend responsible for it, negotiates format
//! support, and drives the two-stage construction pipeline to a finished,
//! adapted renderer. All cross-cutting policy converges here: layer
//! filtering, the all-feature fast path, the storage-projection override
//! for binary vector tiles, and the fallback to the composite backend.

use super::adapter::{RendererAdapter, TileErrorStrategy};
use super::backend::RendererOptions;
use super::error::RendererError;
use super::registry::{BackendKind, RendererRegistry};
use crate::config::RenderLimits;
use crate::mapconfig::{filter, LayerSelector, LayerType, MapConfig};
use crate::tile::TileFormat;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Request parameters relevant to dispatch.
///
/// Owned by the caller for the duration of one request; the factory only
/// reads it.
#[derive(Debug, Clone, Default)]
pub struct TileParams {
    /// Raw layer selector; absent selects every configured layer.
    pub layer: Option<String>,

    /// Requested output format, e.g. `png` or `mvt`.
    pub format: String,

    /// Backend-specific parameters, opaque to the dispatcher.
    pub extra: Map<String, Value>,
}

impl TileParams {
    /// Parameters requesting `format` over every layer.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            layer: None,
            format: format.into(),
            extra: Map::new(),
        }
    }

    /// Restrict the request to the given layer selector.
    pub fn with_layer(mut self, selector: impl Into<String>) -> Self {
        self.layer = Some(selector.into());
        self
    }
}

/// Request-scoped context: per-call overrides of registry-wide defaults.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Resource limits for this request
    pub limits: Option<RenderLimits>,
    /// Tile-error policy for this request
    pub on_tile_error: Option<TileErrorStrategy>,
}

/// The dispatcher.
pub struct RendererFactory {
    registry: Arc<RendererRegistry>,
}

impl RendererFactory {
    /// Factory over an initialized registry.
    pub fn new(registry: Arc<RendererRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this factory dispatches into.
    pub fn registry(&self) -> &Arc<RendererRegistry> {
        &self.registry
    }

    /// Decide which backend serves `selector` over `config` at `format`.
    ///
    /// Pure given its inputs and the registry settings: identical calls
    /// yield the identical kind.
    pub fn resolve_backend(
        &self,
        config: &MapConfig,
        selector: &LayerSelector,
        format: TileFormat,
    ) -> Result<BackendKind, RendererError> {
        let resolved = filter::resolve(config, selector)?;
        Ok(backend_kind(
            config,
            selector,
            &resolved,
            format,
            self.registry.settings().vector.use_storage_projection,
        ))
    }

    /// Resolve, negotiate, construct, adapt.
    ///
    /// Any failure short-circuits the remaining stages and comes back
    /// through this single result channel; construction failures are
    /// forwarded verbatim.
    pub async fn renderer_for(
        &self,
        config: &MapConfig,
        params: &TileParams,
        context: &RenderContext,
    ) -> Result<RendererAdapter, RendererError> {
        let selector = LayerSelector::parse(params.layer.as_deref())?;
        let resolved = filter::resolve(config, &selector)?;

        let format =
            TileFormat::from_str(&params.format).map_err(|_| RendererError::UnsupportedFormat {
                format: params.format.clone(),
            })?;

        let kind = backend_kind(
            config,
            &selector,
            &resolved,
            format,
            self.registry.settings().vector.use_storage_projection,
        );
        let backend = self
            .registry
            .get(kind)
            .ok_or(RendererError::UnsupportedType(kind))?;

        if !backend.supports_format(format) {
            return Err(RendererError::UnsupportedFormat {
                format: params.format.clone(),
            });
        }

        let settings = self.registry.settings();
        let options = RendererOptions {
            layers: resolved,
            limits: context.limits.clone().unwrap_or_else(|| settings.limits.clone()),
            on_tile_error: context.on_tile_error.unwrap_or(settings.on_tile_error),
        };

        debug!(
            backend = %kind,
            format = %format,
            layers = ?options.layers,
            "renderer resolved"
        );

        let raw = backend.create_renderer(config, format, &options).await?;
        Ok(backend.create_adapter(raw, format, options.on_tile_error))
    }
}

/// Backend-name decision procedure, run once per request.
///
/// - An empty resolution (a type-name selector matching no layer) blends
///   into an empty composite rather than taking the feature fast path.
/// - When every resolved layer is a feature layer, the request stays on
///   the feature backend, or on the vector backend when the deployment
///   projects columns storage-side and the output is a binary vector tile.
/// - A single resolved non-feature layer renders through its own backend,
///   skipping blend overhead.
/// - Everything else spans heterogeneous layers and goes to the composite.
fn backend_kind(
    config: &MapConfig,
    selector: &LayerSelector,
    resolved: &[usize],
    format: TileFormat,
    storage_projection: bool,
) -> BackendKind {
    let all_feature = !resolved.is_empty()
        && resolved
            .iter()
            .all(|&index| config.layer_type(index) == Some(LayerType::Feature));

    if all_feature {
        return if storage_projection && format == TileFormat::Mvt {
            BackendKind::Vector
        } else {
            BackendKind::Feature
        };
    }

    let single = match selector {
        LayerSelector::Index(_) => resolved.first(),
        LayerSelector::ByType(_) if resolved.len() == 1 => resolved.first(),
        _ => None,
    };

    match single.and_then(|&index| config.layer_type(index)) {
        Some(kind) => BackendKind::from(kind),
        None => BackendKind::Composite,
    }
}

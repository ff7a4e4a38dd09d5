//! Backend capability contract.
//!
//! Every renderer backend satisfies the same two-stage construction
//! protocol: an asynchronous `create_renderer` producing the raw,
//! backend-specific renderer, followed by a synchronous `create_adapter`
//! wrapping it behind one uniform render surface. The dispatcher drives
//! the stages strictly in order and never constructs before the format
//! capability check has passed.

use super::adapter::{RendererAdapter, TileErrorStrategy};
use super::error::ConstructionError;
use super::registry::BackendKind;
use crate::config::RenderLimits;
use crate::mapconfig::{LayerDef, MapConfig};
use crate::tile::{Tile, TileCoord, TileError, TileFormat};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Uniform surface every finished renderer exposes.
///
/// Renderer instances are request-scoped: they are built for one resolved
/// layer set and format, and are never shared across requests.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Produce the tile at `coord`.
    async fn render_tile(&self, coord: TileCoord) -> Result<Tile, TileError>;

    /// Renderer-specific metadata. Multi-layer renderers report their
    /// sub-layer names, in resolved order, under a `layers` key.
    fn metadata(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Per-request construction inputs threaded from the dispatcher.
#[derive(Debug, Clone)]
pub struct RendererOptions {
    /// Resolved layer indices, in selector order.
    pub layers: Vec<usize>,

    /// Resource limits the backend is responsible for honoring.
    pub limits: RenderLimits,

    /// Effective tile-error policy. The composite backend needs it to
    /// adapt its per-layer sub-renderers.
    pub on_tile_error: TileErrorStrategy,
}

/// Construction contract satisfied by every backend variant.
///
/// One instance per [`BackendKind`] lives in the registry for the process
/// lifetime and may serve concurrent requests; all request-scoped state
/// belongs to the renderers it produces.
#[async_trait]
pub trait RendererBackend: Send + Sync {
    /// Registration key for this backend.
    fn kind(&self) -> BackendKind;

    /// Pure capability check. The dispatcher consults this before any
    /// construction is attempted.
    fn supports_format(&self, format: TileFormat) -> bool;

    /// Build the raw renderer bound to the resolved layers and format.
    ///
    /// Expected failure modes (malformed style, missing option, refused
    /// host, unreachable resource) come back as [`ConstructionError`];
    /// panics are reserved for programming errors.
    async fn create_renderer(
        &self,
        config: &MapConfig,
        format: TileFormat,
        options: &RendererOptions,
    ) -> Result<Box<dyn Renderer>, ConstructionError>;

    /// Wrap a raw renderer in the uniform adapter.
    ///
    /// Synchronous, and must not fail for renderers produced by this
    /// backend's `create_renderer`.
    fn create_adapter(
        &self,
        renderer: Box<dyn Renderer>,
        format: TileFormat,
        on_tile_error: TileErrorStrategy,
    ) -> RendererAdapter {
        RendererAdapter::new(renderer, format, on_tile_error)
    }
}

/// Deserialize a layer's opaque options block into a backend's typed
/// option struct. Absent options mean "all defaults".
pub(crate) fn layer_options<T>(layer: &LayerDef, index: usize) -> Result<T, ConstructionError>
where
    T: DeserializeOwned + Default,
{
    if layer.options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(layer.options.clone()).map_err(|err| ConstructionError::InvalidOption {
        layer: index,
        option: "options",
        message: err.to_string(),
    })
}

//! Renderer resolution and dispatch.
//!
//! This module decides which backend serves a tile request and drives the
//! two-stage construction protocol that turns the decision into a
//! finished renderer.
//!
//! # Architecture
//!
//! ```text
//! TileParams → RendererFactory → layer filter → backend decision
//!            → RendererRegistry → supports_format → create_renderer
//!            → create_adapter → RendererAdapter
//! ```
//!
//! # Key Components
//!
//! - [`RendererFactory`] - the dispatcher; one call per request
//! - [`RendererRegistry`] - one [`RendererBackend`] per [`BackendKind`],
//!   built once at process start
//! - [`RendererAdapter`] - uniform render surface and tile-error policy
//! - [`CompositeBackend`] - blends heterogeneous layers into one output
//!
//! # Example
//!
//! ```ignore
//! use tilecast::config::RendererSettings;
//! use tilecast::renderer::{RenderContext, RendererFactory, RendererRegistry, TileParams};
//!
//! let registry = RendererRegistry::new(RendererSettings::default(), engines)?;
//! let factory = RendererFactory::new(registry);
//!
//! let params = TileParams::new("png").with_layer("1,2");
//! let renderer = factory.renderer_for(&map_config, &params, &Default::default()).await?;
//! let tile = renderer.render_tile(coord).await?;
//! ```

mod adapter;
mod backend;
mod composite;
mod error;
mod factory;
mod feature;
mod http;
mod plain;
mod registry;
mod timeseries;
mod vector;

pub use adapter::{RendererAdapter, TileErrorStrategy};
pub use backend::{Renderer, RendererBackend, RendererOptions};
pub use composite::CompositeBackend;
pub use error::{ConstructionError, RegistryError, RendererError};
pub use factory::{RenderContext, RendererFactory, TileParams};
pub use feature::{FeatureBackend, FeatureEngine, FeatureLayerSpec, FeatureTileSpec};
pub use http::HttpBackend;
pub use plain::PlainBackend;
pub use registry::{BackendKind, RegistryBuilder, RenderEngines, RendererRegistry};
pub use timeseries::{TimeSeriesBackend, TimeSeriesEngine, TimeSeriesLayerSpec, TimeSeriesSpec};
pub use vector::{VectorBackend, VectorEngine};

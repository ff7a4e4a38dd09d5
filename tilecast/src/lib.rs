//! tilecast - renderer resolution and dispatch for a map tile service.
//!
//! Routes a tile request - map configuration, layer selector, output
//! format - to the renderer backend responsible for it, and hands back
//! one uniform, adapted renderer regardless of which backend serves the
//! request.
//!
//! # High-Level API
//!
//! ```ignore
//! use tilecast::config::RendererSettings;
//! use tilecast::mapconfig::MapConfig;
//! use tilecast::renderer::{RenderContext, RendererFactory, RendererRegistry, TileParams};
//! use tilecast::tile::TileCoord;
//!
//! let registry = RendererRegistry::new(RendererSettings::default(), engines)?;
//! let factory = RendererFactory::new(registry);
//!
//! let config = MapConfig::from_json(document)?;
//! let params = TileParams::new("png");
//! let renderer = factory
//!     .renderer_for(&config, &params, &RenderContext::default())
//!     .await?;
//! let tile = renderer.render_tile(TileCoord::new(13, 4011, 3088)).await?;
//! ```

pub mod config;
pub mod logging;
pub mod mapconfig;
pub mod renderer;
pub mod tile;

/// Version of the tilecast library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

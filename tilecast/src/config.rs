//! Process-wide renderer settings.
//!
//! Captured once when the registry is built and read-only afterwards.
//! Per-request overrides travel in
//! [`RenderContext`](crate::renderer::RenderContext).

use crate::renderer::TileErrorStrategy;
use serde::Deserialize;
use std::time::Duration;

/// Settings resolved once at registry construction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Remote-fetch backend settings
    pub http: HttpSettings,
    /// Vector-optimized backend settings
    pub vector: VectorSettings,
    /// Default per-request resource limits
    pub limits: RenderLimits,
    /// Default tile-error policy applied by adapters
    pub on_tile_error: TileErrorStrategy,
}

/// Settings for the remote-fetch backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Hosts a layer's `url_template` is allowed to point at. An exact
    /// entry also admits its subdomains. An empty list refuses every host.
    pub allowed_hosts: Vec<String>,

    /// Upstream request timeout, milliseconds.
    pub timeout_ms: u64,

    /// Optional proxy URL for upstream fetches.
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            timeout_ms: 2_000,
            proxy: None,
        }
    }
}

impl HttpSettings {
    /// Upstream request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Settings for the vector-optimized backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    /// Push column projection down to storage and emit binary vector
    /// tiles directly. When off, vector-tile requests go through the
    /// primary feature backend instead.
    pub use_storage_projection: bool,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            use_storage_projection: false,
        }
    }
}

/// Per-request resource limits, threaded through to the selected backend.
///
/// The dispatcher never interprets these; honoring them is the backend's
/// responsibility.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderLimits {
    /// Hard ceiling on a single tile render, milliseconds.
    pub render_timeout_ms: u64,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            render_timeout_ms: 5_000,
        }
    }
}

impl RenderLimits {
    /// Render time budget as a [`Duration`].
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }
}

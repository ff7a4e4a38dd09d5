//! Typed backend registry.
//!
//! One backend instance per [`BackendKind`], built once at process start
//! and immutable for the process lifetime. Concurrent requests read the
//! registry without locking; all request-scoped state lives in the
//! renderers the backends produce.

use super::backend::RendererBackend;
use super::composite::CompositeBackend;
use super::error::RegistryError;
use super::feature::{FeatureBackend, FeatureEngine};
use super::http::HttpBackend;
use super::plain::PlainBackend;
use super::timeseries::{TimeSeriesBackend, TimeSeriesEngine};
use super::vector::{VectorBackend, VectorEngine};
use crate::config::RendererSettings;
use crate::mapconfig::LayerType;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::info;

/// Registration key for renderer backends.
///
/// `Vector` and `Composite` are selected by the dispatcher, never declared
/// on a layer, which is why they have no [`LayerType`] counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Primary vector/raster feature rendering
    Feature,
    /// Storage-side projection straight to binary vector tiles
    Vector,
    /// Time-series aggregation rendering
    TimeSeries,
    /// Flat single-color fill
    Plain,
    /// Externally hosted tiles fetched over HTTP
    Http,
    /// Blend of heterogeneous layers into one raster output
    Composite,
}

impl BackendKind {
    /// Lowercase registration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Feature => "feature",
            BackendKind::Vector => "vector",
            BackendKind::TimeSeries => "timeseries",
            BackendKind::Plain => "plain",
            BackendKind::Http => "http",
            BackendKind::Composite => "composite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LayerType> for BackendKind {
    fn from(kind: LayerType) -> Self {
        match kind {
            LayerType::Feature => BackendKind::Feature,
            LayerType::TimeSeries => BackendKind::TimeSeries,
            LayerType::Plain => BackendKind::Plain,
            LayerType::Http => BackendKind::Http,
        }
    }
}

/// Engine collaborators injected into the engine-backed backends.
///
/// The actual cartography, vector-tile encoding, and aggregation live
/// behind these trait objects; the registry only wires them up.
#[derive(Clone)]
pub struct RenderEngines {
    /// Engine for the primary feature backend
    pub feature: Arc<dyn FeatureEngine>,
    /// Encoder for the vector-optimized backend
    pub vector: Arc<dyn VectorEngine>,
    /// Engine for the time-series backend
    pub timeseries: Arc<dyn TimeSeriesEngine>,
}

/// Process-wide backend registry.
pub struct RendererRegistry {
    backends: HashMap<BackendKind, Arc<dyn RendererBackend>>,
    settings: RendererSettings,
}

impl RendererRegistry {
    /// Registry with the full stock backend set.
    ///
    /// # Errors
    ///
    /// Fails when the remote-fetch backend's shared HTTP client cannot be
    /// built (for example, a malformed proxy URL).
    pub fn new(
        settings: RendererSettings,
        engines: RenderEngines,
    ) -> Result<Arc<Self>, RegistryError> {
        let http = HttpBackend::new(&settings.http)?;

        Ok(Self::builder(settings)
            .with_backend(Arc::new(FeatureBackend::new(engines.feature)))
            .with_backend(Arc::new(VectorBackend::new(engines.vector)))
            .with_backend(Arc::new(TimeSeriesBackend::new(engines.timeseries)))
            .with_backend(Arc::new(PlainBackend::new()))
            .with_backend(Arc::new(http))
            .build())
    }

    /// Builder for custom or partial registries.
    pub fn builder(settings: RendererSettings) -> RegistryBuilder {
        RegistryBuilder {
            settings,
            backends: HashMap::new(),
        }
    }

    /// Backend registered under `kind`, if any.
    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn RendererBackend>> {
        self.backends.get(&kind).cloned()
    }

    /// Settings captured when the registry was built.
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }
}

/// Assembles a [`RendererRegistry`].
///
/// Doubles as the test seam: any [`BackendKind`] can be bound to a custom
/// implementation before `build`.
pub struct RegistryBuilder {
    settings: RendererSettings,
    backends: HashMap<BackendKind, Arc<dyn RendererBackend>>,
}

impl RegistryBuilder {
    /// Register `backend` under its own kind, replacing any earlier entry.
    pub fn with_backend(mut self, backend: Arc<dyn RendererBackend>) -> Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    /// Finish the registry.
    ///
    /// Unless one was registered explicitly, the composite backend is
    /// added here: it holds a weak handle back to the registry so it can
    /// fan out to its peers without keeping the registry alive.
    pub fn build(self) -> Arc<RendererRegistry> {
        let RegistryBuilder {
            settings,
            mut backends,
        } = self;

        Arc::new_cyclic(|registry: &Weak<RendererRegistry>| {
            backends
                .entry(BackendKind::Composite)
                .or_insert_with(|| Arc::new(CompositeBackend::new(registry.clone())));

            info!(backends = backends.len(), "renderer registry initialized");
            RendererRegistry { backends, settings }
        })
    }
}

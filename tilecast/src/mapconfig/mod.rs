//! Map configuration document.
//!
//! A map configuration is an ordered sequence of layer descriptors,
//! received from the caller as a JSON document. The dispatch core only
//! reads the layer count, each layer's declared type, and display
//! identifiers; validating the full document schema is the caller's job.

pub mod filter;
mod layer;

pub use filter::{FilterError, LayerSelector};
pub use layer::{LayerDef, LayerType, UnknownLayerType};

use serde::{Deserialize, Serialize};

/// Ordered set of configured layers.
///
/// Immutable once handed to the dispatcher. Layer identity is positional:
/// an explicit `id` is display-only and never changes indexing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapConfig {
    layers: Vec<LayerDef>,
}

impl MapConfig {
    /// Build a configuration from an ordered layer list.
    pub fn new(layers: Vec<LayerDef>) -> Self {
        Self { layers }
    }

    /// Parse a configuration from its JSON document form.
    pub fn from_json(doc: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(doc)
    }

    /// Layer descriptor at `index`, if it exists.
    pub fn layer(&self, index: usize) -> Option<&LayerDef> {
        self.layers.get(index)
    }

    /// Declared type of the layer at `index`, if it exists.
    pub fn layer_type(&self, index: usize) -> Option<LayerType> {
        self.layers.get(index).map(|layer| layer.kind)
    }

    /// Number of configured layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// All layer descriptors, in configuration order.
    pub fn layers(&self) -> &[LayerDef] {
        &self.layers
    }

    /// Display name for the layer at `index`: its explicit `id` when one
    /// was given, otherwise the positional `layer{index}` form.
    pub fn layer_name(&self, index: usize) -> String {
        match self.layer(index).and_then(|layer| layer.id.as_deref()) {
            Some(id) => id.to_string(),
            None => format!("layer{index}"),
        }
    }
}

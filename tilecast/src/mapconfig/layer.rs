//! Layer descriptor types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Declared type of a configured layer.
///
/// This is the fixed set of types a map configuration may declare. The
/// composite and vector-optimized backends are selected by the dispatcher
/// and never declared on a layer, so they are not part of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    /// Primary vector/raster feature rendering
    Feature,
    /// Time-series aggregation rendering
    #[serde(rename = "timeseries")]
    TimeSeries,
    /// Flat single-color fill
    Plain,
    /// Externally hosted tiles fetched over HTTP
    Http,
}

impl LayerType {
    /// The wire name of this type, as it appears in configuration documents
    /// and type-name layer selectors.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Feature => "feature",
            LayerType::TimeSeries => "timeseries",
            LayerType::Plain => "plain",
            LayerType::Http => "http",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerType {
    type Err = UnknownLayerType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(LayerType::Feature),
            "timeseries" => Ok(LayerType::TimeSeries),
            "plain" => Ok(LayerType::Plain),
            "http" => Ok(LayerType::Http),
            other => Err(UnknownLayerType(other.to_string())),
        }
    }
}

/// A type name outside the declarable set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown layer type '{0}'")]
pub struct UnknownLayerType(pub String);

/// One layer within a [`MapConfig`](super::MapConfig).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDef {
    /// Optional display identifier. Indexing stays positional either way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Declared layer type, driving backend selection.
    #[serde(rename = "type")]
    pub kind: LayerType,

    /// Backend-specific options, opaque to the dispatch core. Each backend
    /// deserializes its own typed option struct out of this value.
    #[serde(default)]
    pub options: Value,
}

impl LayerDef {
    /// New layer of the given type with no id and no options.
    pub fn new(kind: LayerType) -> Self {
        Self {
            id: None,
            kind,
            options: Value::Null,
        }
    }

    /// Attach a display identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach backend-specific options.
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

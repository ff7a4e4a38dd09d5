//! Error taxonomy for the dispatch pipeline.
//!
//! Every failure short-circuits the pipeline and is delivered through the
//! single result channel of
//! [`RendererFactory::renderer_for`](super::RendererFactory::renderer_for).
//! Nothing here is retried; retry policy, if any, belongs to the backend
//! or to a caller-supplied layer.

use super::registry::BackendKind;
use crate::mapconfig::FilterError;
use thiserror::Error;

/// Failures surfaced by the dispatcher.
#[derive(Debug, Error)]
pub enum RendererError {
    /// A numeric selector referenced a layer outside the configuration.
    #[error("layer '{index}' not found in map config ({layer_count} layers)")]
    LayerNotFound { index: i64, layer_count: usize },

    /// The selector string could not be understood.
    #[error("invalid layer selector '{0}'")]
    InvalidSelector(String),

    /// The resolved backend kind has no registered implementation.
    #[error("no renderer registered for type '{0}'")]
    UnsupportedType(BackendKind),

    /// The format is unknown, or the resolved backend declined it.
    #[error("unsupported format '{format}'")]
    UnsupportedFormat { format: String },

    /// The asynchronous construction stage failed; forwarded verbatim.
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

impl From<FilterError> for RendererError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::LayerNotFound { index, layer_count } => {
                RendererError::LayerNotFound { index, layer_count }
            }
            FilterError::InvalidSelector(raw) => RendererError::InvalidSelector(raw),
        }
    }
}

/// Failures while constructing a raw renderer.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// A resolved layer lacks an option its backend requires.
    #[error("layer {layer}: missing required option '{option}'")]
    MissingOption { layer: usize, option: &'static str },

    /// A layer option is present but unusable.
    #[error("layer {layer}: invalid option '{option}': {message}")]
    InvalidOption {
        layer: usize,
        option: &'static str,
        message: String,
    },

    /// A layer's cartographic style is malformed or missing.
    #[error("layer {layer}: invalid style: {message}")]
    InvalidStyle { layer: usize, message: String },

    /// The remote-fetch allowlist refused a layer's upstream host.
    #[error("host '{host}' is not in the remote tile allowlist")]
    HostNotAllowed { host: String },

    /// An upstream resource could not be reached during construction.
    #[error("resource '{url}' unreachable: {message}")]
    Unreachable { url: String, message: String },

    /// Backend-specific failure with no finer classification.
    #[error("{0}")]
    Backend(String),
}

/// Failures while building the process-wide registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The shared HTTP client could not be constructed.
    #[error("http client init failed: {0}")]
    HttpClient(String),
}

//! Layer selector resolution.
//!
//! Maps the `layer` request parameter to an ordered set of layer indices
//! against a [`MapConfig`]. Resolution is a pure function: no side
//! effects, deterministic, safe to call repeatedly with the same inputs.

use super::{LayerType, MapConfig};
use std::str::FromStr;
use thiserror::Error;

/// Failures while parsing or resolving a layer selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A numeric selector referenced a layer outside the configuration.
    #[error("layer '{index}' not found in map config ({layer_count} layers)")]
    LayerNotFound { index: i64, layer_count: usize },

    /// The selector string could not be understood at all.
    #[error("invalid layer selector '{0}'")]
    InvalidSelector(String),
}

/// Parsed form of the `layer` request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSelector {
    /// No selector given: every configured layer.
    All,
    /// A single numeric index.
    Index(i64),
    /// A comma-separated list of indices; order is significant.
    List(Vec<i64>),
    /// Every layer declaring the given type.
    ByType(LayerType),
}

impl LayerSelector {
    /// Parse the raw request parameter.
    ///
    /// An absent parameter and the literal `all` both select every layer.
    /// Anything that is not an index, a comma-separated index list, or a
    /// known type name fails with [`FilterError::InvalidSelector`].
    pub fn parse(raw: Option<&str>) -> Result<Self, FilterError> {
        let Some(raw) = raw else {
            return Ok(LayerSelector::All);
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "all" {
            return Ok(LayerSelector::All);
        }

        if trimmed.contains(',') {
            let indices = trimmed
                .split(',')
                .map(|token| {
                    token
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| FilterError::InvalidSelector(raw.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(LayerSelector::List(indices));
        }

        if let Ok(index) = trimmed.parse::<i64>() {
            return Ok(LayerSelector::Index(index));
        }

        match LayerType::from_str(trimmed) {
            Ok(kind) => Ok(LayerSelector::ByType(kind)),
            Err(_) => Err(FilterError::InvalidSelector(raw.to_string())),
        }
    }

    /// True when the selector names exactly one layer index.
    pub fn is_single_index(&self) -> bool {
        matches!(self, LayerSelector::Index(_))
    }
}

/// Resolve a selector to an ordered set of layer indices.
///
/// Numeric selectors are validated against the configuration's length; an
/// out-of-range or negative index is a [`FilterError::LayerNotFound`],
/// never a silent empty result. A type-name selector may legitimately
/// match zero layers.
pub fn resolve(config: &MapConfig, selector: &LayerSelector) -> Result<Vec<usize>, FilterError> {
    let layer_count = config.layer_count();
    let validated = |index: i64| -> Result<usize, FilterError> {
        if index < 0 || index >= layer_count as i64 {
            Err(FilterError::LayerNotFound { index, layer_count })
        } else {
            Ok(index as usize)
        }
    };

    match selector {
        LayerSelector::All => Ok((0..layer_count).collect()),
        LayerSelector::Index(index) => Ok(vec![validated(*index)?]),
        LayerSelector::List(indices) => indices.iter().map(|&index| validated(index)).collect(),
        LayerSelector::ByType(kind) => Ok((0..layer_count)
            .filter(|&index| config.layer_type(index) == Some(*kind))
            .collect()),
    }
}
